//! Wire-level request/response shapes (spec §6.1). Response bodies
//! reuse domain model types directly wherever they already serialize
//! the right shape (`User`, `Application`, `QuotaUsage`, ...), the way
//! the teacher's response DTOs wrap `fechatter_core::{User, Workspace}`
//! rather than re-declaring their fields.

pub mod requests;
pub mod responses;

pub use requests::*;
pub use responses::*;
