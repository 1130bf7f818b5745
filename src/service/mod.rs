//! CrudService: list and read execution using the safe SQL builder.

mod crud;
pub use crud::{strip_sensitive, CrudService, Page, Pagination};
