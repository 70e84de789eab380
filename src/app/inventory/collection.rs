use super::config::CollectorConfig;
use super::enricher::{EnrichedFunction, RecordEnricher};
use super::errors::{CollectionError, EnrichmentError};
use super::facade::LambdaFacade;
use super::records::{FunctionRecord, RawFunction};
use futures::stream::{FuturesUnordered, StreamExt};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

/// Every Lambda function of one region, keyed by function name
///
/// Serializes as the plain name → record mapping; diagnostics are kept aside
/// for the caller's summary.
#[derive(Debug, Default)]
pub struct FunctionCollection {
    region: String,
    functions: BTreeMap<String, FunctionRecord>,
    diagnostics: Vec<EnrichmentError>,
}

impl FunctionCollection {
    fn new(region: &str) -> Self {
        Self {
            region: region.to_string(),
            ..Default::default()
        }
    }

    fn insert(&mut self, enriched: EnrichedFunction) {
        let EnrichedFunction {
            record,
            diagnostics,
        } = enriched;
        self.diagnostics.extend(diagnostics);

        let name = record.name.clone();
        if self.functions.insert(name.clone(), record).is_some() {
            log_warn!(
                "Duplicate function name {} in {}, keeping the last record",
                name,
                self.region
            );
        }
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn get(&self, name: &str) -> Option<&FunctionRecord> {
        self.functions.get(name)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FunctionRecord)> {
        self.functions.iter().map(|(name, record)| (name.as_str(), record))
    }

    /// Non-fatal problems met while building the collection
    pub fn diagnostics(&self) -> &[EnrichmentError] {
        &self.diagnostics
    }

    pub fn into_functions(self) -> BTreeMap<String, FunctionRecord> {
        self.functions
    }
}

impl Serialize for FunctionCollection {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.functions.serialize(serializer)
    }
}

/// Fetch-and-enrich pipeline for Lambda functions
pub struct FunctionCollector {
    facade: Arc<dyn LambdaFacade>,
    enricher: RecordEnricher,
    max_concurrent_records: usize,
}

impl FunctionCollector {
    pub fn new(facade: Arc<dyn LambdaFacade>) -> Self {
        Self::with_config(facade, &CollectorConfig::default())
    }

    pub fn with_config(facade: Arc<dyn LambdaFacade>, config: &CollectorConfig) -> Self {
        Self {
            enricher: RecordEnricher::new(Arc::clone(&facade)),
            facade,
            max_concurrent_records: config.max_concurrent_records.max(1),
        }
    }

    /// Collect and enrich every function in `region`
    pub async fn fetch_all(&self, region: &str) -> Result<FunctionCollection, CollectionError> {
        self.fetch_all_with_cancellation(region, &CancellationToken::new())
            .await
    }

    /// Same as [`fetch_all`](Self::fetch_all), aborted as a whole when `cancel` fires
    ///
    /// Records still being enriched at that point are dropped; only complete
    /// records ever enter a collection.
    pub async fn fetch_all_with_cancellation(
        &self,
        region: &str,
        cancel: &CancellationToken,
    ) -> Result<FunctionCollection, CollectionError> {
        if region.trim().is_empty() {
            return Err(CollectionError::InvalidRegion(region.to_string()));
        }

        let cancelled = || CollectionError::Cancelled {
            region: region.to_string(),
        };

        let raw_records = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(cancelled()),
            listed = self.facade.list_raw_records(region) => listed?,
        };
        log_info!(
            "Listed {} Lambda functions in {}",
            raw_records.len(),
            region
        );

        let mut collection = FunctionCollection::new(region);
        let mut pending = Vec::with_capacity(raw_records.len());
        for (index, raw) in raw_records.into_iter().enumerate() {
            let parsed = RawFunction::from_raw(&raw).map_err(|e| e.to_string());
            match parsed.and_then(|raw| {
                FunctionRecord::from_raw(raw).ok_or_else(|| "missing FunctionName".to_string())
            }) {
                Ok(record) => pending.push((index, record)),
                Err(reason) => {
                    let diagnostic = EnrichmentError::InvalidRecord { index, reason };
                    log_warn!("{} in {}", diagnostic, region);
                    collection.diagnostics.push(diagnostic);
                }
            }
        }

        let semaphore = Arc::new(Semaphore::new(self.max_concurrent_records));
        let mut in_flight: FuturesUnordered<_> = pending
            .into_iter()
            .map(|(index, record)| {
                let semaphore = Arc::clone(&semaphore);
                async move {
                    // The semaphore is never closed, so acquiring cannot fail
                    let _permit = semaphore.acquire().await.ok();
                    trace_debug!("Enriching function {} in {}", record.name, region);
                    (index, self.enricher.enrich(record, region).await)
                }
            })
            .collect();

        let mut completed = Vec::with_capacity(in_flight.len());

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    log_warn!(
                        "Collection for {} cancelled with {} functions outstanding",
                        region,
                        in_flight.len()
                    );
                    return Err(cancelled());
                }
                next = in_flight.next() => match next {
                    Some(done) => completed.push(done),
                    None => break,
                },
            }
        }

        // Listing order decides which duplicate survives
        completed.sort_by_key(|(index, _)| *index);
        for (_, enriched) in completed {
            collection.insert(enriched);
        }

        log_info!(
            "Collected {} Lambda functions in {} ({} diagnostics)",
            collection.len(),
            region,
            collection.diagnostics.len()
        );
        Ok(collection)
    }
}
