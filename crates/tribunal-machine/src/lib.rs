//! Machine-step layer: the [`StepOracle`] transition interface, the
//! [`WordAccess`] memory seam it runs against, footprint recording for proof
//! generation, and a small subtract-and-branch interpreter used as the
//! reference oracle.

pub mod oracle;
pub mod recorder;
pub mod subleq;

pub use oracle::{StepFault, StepOracle, StepStatus, WordAccess};
pub use recorder::{authenticate_footprint, AccessRecorder, RecordedAccess};
pub use subleq::Subleq;
