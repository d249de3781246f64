//! Upstream provider abstraction.

use std::future::Future;

use crate::types::MetricSnapshot;
use crate::Result;

/// One upstream provider of per-resort data.
///
/// `fetch` must return a snapshot covering every registered resort; a resort
/// whose upstream lookup failed is present with `None`. An `Err` is reserved
/// for total failure of the provider. Implementations do not retry.
pub trait MetricSource: Send + Sync + 'static {
    type Report: Clone + Send + Sync + 'static;

    /// Name used in logs and `NoDataYet` errors.
    fn name(&self) -> &str;

    fn fetch(&self) -> impl Future<Output = Result<MetricSnapshot<Self::Report>>> + Send;
}
