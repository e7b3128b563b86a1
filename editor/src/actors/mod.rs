pub mod session_sweeper;

pub use session_sweeper::{
    SessionSweeperActor, SweepNotice, SweepReport, SweeperArguments, SweeperMsg,
};
