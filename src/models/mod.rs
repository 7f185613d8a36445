pub mod enums;
pub mod form;
pub mod income;
pub mod run;
pub mod tax;
pub mod taxpayer;

pub use enums::*;
pub use form::*;
pub use income::*;
pub use run::*;
pub use tax::*;
pub use taxpayer::*;
