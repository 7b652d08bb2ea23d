mod bson;
mod collection;
mod errors;
mod store;

pub use bson::Id;
pub use collection::{ensure_indexes_exist, Coll, MongoCollection};
pub use errors::{is_duplicate_key_error, is_transient_transaction_error, DUPLICATE_KEY};
pub use store::MongoStore;
