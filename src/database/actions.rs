pub mod images;
pub mod labels;
pub mod recipes;
pub mod users;

pub use images::*;
pub use labels::*;
pub use recipes::*;
pub use users::*;
