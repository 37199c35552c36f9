pub mod timing;

pub use timing::{attach, timing_middleware, TimingHook};
