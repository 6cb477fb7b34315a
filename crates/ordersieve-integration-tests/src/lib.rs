//! Integration tests for the ordersieve workspace
//!
//! The end-to-end scenarios live in `tests/`; they run the full pipeline
//! against a mock classifier endpoint and the in-memory store.

#[cfg(test)]
mod tests {
    #[test]
    fn it_works() {
        assert_eq!(2 + 2, 4);
    }
}
