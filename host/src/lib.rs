//! integration suite for the stxlink host and device ends, see `tests/`
