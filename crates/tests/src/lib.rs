pub mod fixtures;

#[cfg(test)]
mod annotate_stream_tests;
#[cfg(test)]
mod paragraph_tests;
