/*!
    The packet-to-frame pump.

    Decoders buffer several packets before the first frame appears, and
    keep frames back until drained at end of stream. This loop hides
    that latency behind a single "give me the next frame" call, bounded
    so a broken stream cannot spin forever.
*/

use log::trace;

use capture_types::{DecodeSession, DecodedFrame, Error, FramePoll, Packet, PacketSource, Result};

/// Upper bound on poll/feed iterations per frame.
pub const MAX_DECODE_ATTEMPTS: usize = 100;

/**
    Pump packets into the session until it yields one frame.

    Returns `Ok(None)` once the stream is fully drained. `eof_sent`
    tracks whether the drain signal went to the decoder; the caller
    owns it so a seek can reset it alongside a decoder flush.
*/
pub fn decode_next<S, D>(
    source: &mut S,
    session: &mut D,
    eof_sent: &mut bool,
) -> Result<Option<DecodedFrame>>
where
    S: PacketSource + ?Sized,
    D: DecodeSession + ?Sized,
{
    // A packet the session refused with WouldBlock; resent after the
    // next poll makes room.
    let mut unsent: Option<Packet> = None;

    for attempt in 0..MAX_DECODE_ATTEMPTS {
        match session.poll_frame()? {
            FramePoll::Frame(frame) => {
                trace!("frame after {} attempts", attempt + 1);
                return Ok(Some(frame));
            }
            FramePoll::EndOfStream => return Ok(None),
            FramePoll::Pending => {}
        }

        let packet = match unsent.take() {
            Some(packet) => Some(packet),
            None => {
                if *eof_sent {
                    // Drain already signalled; nothing left to feed.
                    continue;
                }
                match source.next_packet() {
                    Ok(packet) => packet,
                    // Live source starving; poll again rather than bail.
                    Err(Error::WouldBlock) => continue,
                    Err(e) => return Err(e),
                }
            }
        };

        match packet {
            Some(packet) => match session.submit(Some(&packet)) {
                Ok(()) => {}
                Err(Error::WouldBlock) => unsent = Some(packet),
                Err(e) => return Err(e),
            },
            None => {
                session.submit(None)?;
                *eof_sent = true;
            }
        }
    }

    Err(Error::codec(format!(
        "no frame produced after {} decode attempts",
        MAX_DECODE_ATTEMPTS
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    use capture_types::headless::HeadlessDevice;
    use capture_types::{GpuFormat, PixelLayout, TextureDesc};

    fn frame(pts_secs: f64) -> DecodedFrame {
        let desc = TextureDesc {
            width: 640,
            height: 360,
            format: GpuFormat::Nv12,
            array_layers: 1,
        };
        DecodedFrame {
            texture: HeadlessDevice::make_texture(desc),
            width: 640,
            height: 360,
            pts_secs,
            keyframe: false,
            layout: PixelLayout::Yuv,
            format: GpuFormat::Nv12,
        }
    }

    fn packet() -> Packet {
        Packet {
            data: vec![0; 16],
            pts: None,
            dts: None,
            stream_index: 0,
            keyframe: false,
        }
    }

    struct ScriptedSource {
        script: VecDeque<Result<Option<Packet>>>,
        reads: usize,
    }

    impl ScriptedSource {
        fn new(script: Vec<Result<Option<Packet>>>) -> Self {
            Self {
                script: script.into(),
                reads: 0,
            }
        }

        fn endless_packets() -> Self {
            Self {
                script: VecDeque::new(),
                reads: 0,
            }
        }
    }

    impl PacketSource for ScriptedSource {
        fn next_packet(&mut self) -> Result<Option<Packet>> {
            self.reads += 1;
            self.script.pop_front().unwrap_or_else(|| Ok(Some(packet())))
        }
    }

    #[derive(Default)]
    struct ScriptedSession {
        polls: VecDeque<FramePoll>,
        packets_in: usize,
        eof_signals: usize,
        refuse_next_submit: bool,
    }

    impl DecodeSession for ScriptedSession {
        fn submit(&mut self, packet: Option<&Packet>) -> Result<()> {
            if packet.is_some() && self.refuse_next_submit {
                self.refuse_next_submit = false;
                return Err(Error::WouldBlock);
            }
            match packet {
                Some(_) => self.packets_in += 1,
                None => self.eof_signals += 1,
            }
            Ok(())
        }

        fn poll_frame(&mut self) -> Result<FramePoll> {
            Ok(self.polls.pop_front().unwrap_or(FramePoll::Pending))
        }
    }

    #[test]
    fn feeds_packets_until_frame_appears() {
        let mut source = ScriptedSource::endless_packets();
        let mut session = ScriptedSession {
            // Three packets of priming before the first frame.
            polls: [
                FramePoll::Pending,
                FramePoll::Pending,
                FramePoll::Pending,
                FramePoll::Frame(frame(0.0)),
            ]
            .into_iter()
            .collect(),
            ..Default::default()
        };
        let mut eof_sent = false;

        let out = decode_next(&mut source, &mut session, &mut eof_sent).unwrap();

        assert!(out.is_some());
        assert_eq!(session.packets_in, 3);
        assert!(!eof_sent);
    }

    #[test]
    fn frame_already_buffered_reads_no_packets() {
        let mut source = ScriptedSource::endless_packets();
        let mut session = ScriptedSession {
            polls: [FramePoll::Frame(frame(0.2))].into_iter().collect(),
            ..Default::default()
        };
        let mut eof_sent = false;

        let out = decode_next(&mut source, &mut session, &mut eof_sent).unwrap();

        assert!(out.is_some());
        assert_eq!(source.reads, 0);
    }

    #[test]
    fn eof_drains_buffered_frames_then_ends() {
        let mut source = ScriptedSource::new(vec![Ok(None)]);
        let mut session = ScriptedSession {
            polls: [
                FramePoll::Pending,
                FramePoll::Frame(frame(0.9)),
                FramePoll::Pending,
                FramePoll::EndOfStream,
            ]
            .into_iter()
            .collect(),
            ..Default::default()
        };
        let mut eof_sent = false;

        // Frame held back by the decoder comes out during the drain.
        let first = decode_next(&mut source, &mut session, &mut eof_sent).unwrap();
        assert!(first.is_some());
        assert!(eof_sent);

        let second = decode_next(&mut source, &mut session, &mut eof_sent).unwrap();
        assert!(second.is_none());

        assert_eq!(session.eof_signals, 1);
        // The exhausted source is never read again once EOF was signalled.
        assert_eq!(source.reads, 1);
    }

    #[test]
    fn refused_packet_is_resent_not_dropped() {
        let mut source = ScriptedSource::endless_packets();
        let mut session = ScriptedSession {
            polls: [
                FramePoll::Pending,
                FramePoll::Pending,
                FramePoll::Frame(frame(0.0)),
            ]
            .into_iter()
            .collect(),
            refuse_next_submit: true,
            ..Default::default()
        };
        let mut eof_sent = false;

        let out = decode_next(&mut source, &mut session, &mut eof_sent).unwrap();

        assert!(out.is_some());
        // One packet read, refused once, then accepted on retry.
        assert_eq!(source.reads, 1);
        assert_eq!(session.packets_in, 1);
    }

    #[test]
    fn starving_live_source_is_polled_not_failed() {
        let mut script: Vec<Result<Option<Packet>>> =
            vec![Err(Error::WouldBlock), Err(Error::WouldBlock)];
        script.push(Ok(Some(packet())));
        let mut source = ScriptedSource::new(script);
        let mut session = ScriptedSession {
            polls: [
                FramePoll::Pending,
                FramePoll::Pending,
                FramePoll::Pending,
                FramePoll::Frame(frame(0.1)),
            ]
            .into_iter()
            .collect(),
            ..Default::default()
        };
        let mut eof_sent = false;

        let out = decode_next(&mut source, &mut session, &mut eof_sent).unwrap();

        assert!(out.is_some());
        assert_eq!(session.packets_in, 1);
    }

    #[test]
    fn never_yielding_session_fails_within_bound() {
        let mut source = ScriptedSource::endless_packets();
        let mut session = ScriptedSession::default(); // always Pending
        let mut eof_sent = false;

        let err = decode_next(&mut source, &mut session, &mut eof_sent).unwrap_err();

        assert!(matches!(err, Error::Codec(_)));
        assert!(session.packets_in <= MAX_DECODE_ATTEMPTS);
    }

    #[test]
    fn reset_flag_resumes_feeding_after_seek() {
        let mut source = ScriptedSource::new(vec![Ok(None)]);
        let mut session = ScriptedSession {
            polls: [FramePoll::Pending, FramePoll::EndOfStream].into_iter().collect(),
            ..Default::default()
        };
        let mut eof_sent = false;

        assert!(decode_next(&mut source, &mut session, &mut eof_sent)
            .unwrap()
            .is_none());
        assert!(eof_sent);

        // A seek flushes the decoder and clears the flag; the pump must
        // go back to reading packets.
        eof_sent = false;
        let mut session = ScriptedSession {
            polls: [FramePoll::Pending, FramePoll::Frame(frame(0.0))]
                .into_iter()
                .collect(),
            ..Default::default()
        };
        let mut source = ScriptedSource::endless_packets();

        let out = decode_next(&mut source, &mut session, &mut eof_sent).unwrap();
        assert!(out.is_some());
        assert_eq!(session.packets_in, 1);
    }
}
