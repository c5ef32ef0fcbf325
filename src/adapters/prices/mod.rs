//! Price adapters
//!
//! Run sequentially in declared order over a shared accumulator. The
//! general-purpose feed goes first; specialist adapters later in the
//! chain override it for the asset classes it prices poorly.

mod usd_feed;
mod wrapped_native;

pub use usd_feed::UsdFeedAdapter;
pub use wrapped_native::WrappedNativeAdapter;
