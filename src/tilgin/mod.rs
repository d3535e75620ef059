//! Tilgin router web interface integration
//!
//! - `extract`: Secret and form token scraping from served HTML
//! - `protocol`: Form fields, firmware variants, credential hash
//! - `client`: Cookie-bearing HTTP session and reachability probe
//! - `liveness`: Down→up wait after a restart
//! - `sequencer`: Ordered login → restart → verify run

pub mod client;
pub mod extract;
pub mod liveness;
pub mod protocol;
pub mod sequencer;

pub use protocol::Protocol;
pub use sequencer::{RestartReport, Sequencer};
