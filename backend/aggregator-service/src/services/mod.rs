pub mod aggregator;
pub mod assembler;
pub mod fanout;
pub mod ranking;
pub mod selector;

pub use aggregator::FeedAggregator;
pub use assembler::ResultAssembler;
pub use fanout::{FanOutJoiner, JoinStrategy};
pub use selector::CandidateSelector;
