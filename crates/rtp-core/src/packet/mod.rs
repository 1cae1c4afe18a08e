//! Wire-format packet handling

pub mod rtcp;
