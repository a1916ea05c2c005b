mod resource;
mod token;

pub use resource::*;
pub use token::*;
