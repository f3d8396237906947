/*!
    Trait seams between the demuxer, the decode session, and the pump.

    Hardware decode is asynchronous at the API level: packets go in and
    frames come out, but not 1:1. These traits capture just enough of that
    shape for the capture pump's bounded decode loop to be written and
    tested independently of FFmpeg and GPU hardware.
*/

use crate::{DecodedFrame, Packet, Result};

/**
    Outcome of polling a decode session for a frame.
*/
#[derive(Debug)]
pub enum FramePoll {
    /// A frame is ready.
    Frame(DecodedFrame),
    /// No frame available yet; submit more packets and poll again.
    Pending,
    /// The session has drained completely.
    EndOfStream,
}

/**
    An ordered source of compressed access units for one video stream.
*/
pub trait PacketSource {
    /**
        Pull the next packet. `Ok(None)` is terminal end of stream;
        [`crate::Error::WouldBlock`] means a live source has no data yet.
    */
    fn next_packet(&mut self) -> Result<Option<Packet>>;
}

/**
    One hardware decode session: packets in, frames out.
*/
pub trait DecodeSession {
    /**
        Submit one packet; `None` signals end-of-stream drain. A session
        whose input queue is full returns [`crate::Error::WouldBlock`];
        the caller polls a frame out and resends the same packet.
    */
    fn submit(&mut self, packet: Option<&Packet>) -> Result<()>;

    /**
        Poll for the next decoded frame.
    */
    fn poll_frame(&mut self) -> Result<FramePoll>;
}
