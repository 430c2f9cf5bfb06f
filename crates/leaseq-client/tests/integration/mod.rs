mod common;
mod roundtrip_tests;
