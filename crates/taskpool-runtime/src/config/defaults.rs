//! Compile-time defaults generated by build.rs

include!(concat!(env!("OUT_DIR"), "/tp_merged_config.rs"));
