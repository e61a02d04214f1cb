//! Component-level test suite; see `unit/`.

mod unit;
