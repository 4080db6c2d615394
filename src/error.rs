/// Macro to generate the `sqlx::Error` conversion for store error enums
///
/// Usage:
/// ```ignore
/// impl_store_error_conversions!(StoreError, Database);
/// ```
#[macro_export]
macro_rules! impl_store_error_conversions {
  ($error_type:ty, $database_variant:ident) => {
    impl From<sqlx::Error> for $error_type {
      fn from(err: sqlx::Error) -> Self {
        <$error_type>::$database_variant(format!("Database error: {}", err))
      }
    }
  };
}
