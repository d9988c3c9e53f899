//! Command framing over a shared shell output stream.
//!
//! A persistent shell writes the output of every command it ever runs to
//! the same unframed pipe. To pull out exactly one command's output, each
//! submission is wrapped between two freshly generated markers:
//!
//! ```text
//! echo 'START-<token>'
//! { <command>
//! } 2>&1
//! __shell_relay_status=$?
//! echo 'END-<token>'
//! ```
//!
//! [`FrameDecoder`] then scans the stream for the start marker line and
//! returns everything up to the end marker. The decoder has no notion of
//! time; bounding the wait is the caller's job.
//!
//! # Example
//!
//! ```
//! use shell_relay::framing::{decode_output, FrameDecoder, Invocation};
//!
//! # tokio_test::block_on(async {
//! let invocation = Invocation::new("echo hello");
//! let markers = invocation.markers().clone();
//! let stream = format!("noise\n{}\nhello\n{}\n", markers.start(), markers.end());
//!
//! let mut decoder = FrameDecoder::new(stream.as_bytes());
//! let body = decoder.read_frame(&markers).await.unwrap();
//! assert_eq!(decode_output(&body), "hello");
//! # });
//! ```

mod decoder;
mod invocation;

pub use decoder::{FrameDecoder, DEFAULT_CHUNK_SIZE};
pub use invocation::{Invocation, Markers, END_PREFIX, START_PREFIX, STATUS_VAR};

/// Convert a decoded frame body into caller-facing text.
///
/// Invalid UTF-8 is replaced lossily and trailing line terminators are
/// trimmed, so `echo hello` yields `hello`.
pub fn decode_output(body: &[u8]) -> String {
    String::from_utf8_lossy(body)
        .trim_end_matches(['\n', '\r'])
        .to_string()
}
