use std::path::Path;

use rotorlink_frame::{FrameConfig, PacketReader, PacketWriter, StreamChannel};
use rotorlink_transport::{LinkStream, UnixDomainSocket};

use crate::config::PortConfig;
use crate::dispatcher::PortDispatcher;
use crate::error::Result;
use crate::sender::PortSender;

/// Connect to a listening port.
pub fn connect(path: impl AsRef<Path>, config: FrameConfig) -> Result<StreamChannel> {
    let stream = UnixDomainSocket::connect(path)?;
    Ok(StreamChannel::open(stream, config)?)
}

/// Dispatcher for the receive half of `channel`, sender for the other.
pub fn split_port(
    channel: StreamChannel,
    config: &PortConfig,
) -> Result<(
    PortDispatcher<PacketReader<LinkStream>>,
    PortSender<PacketWriter<LinkStream>>,
)> {
    let (reader, writer) = channel.into_split();
    let mut sender = PortSender::new(writer);
    sender.set_report_divisor(config.report_divisor)?;
    Ok((PortDispatcher::new(reader), sender))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rotorlink_frame::{PacketSource, PacketType};

    use super::*;
    use crate::error::PortError;
    use crate::payload::{GroundReport, Payload};

    #[test]
    fn split_port_wires_both_directions() {
        let (board, ground) = LinkStream::pair().expect("pair should open");
        let config = PortConfig {
            report_divisor: 2,
            ..PortConfig::default()
        };
        let channel = StreamChannel::open(board, FrameConfig::default()).expect("channel");
        let (_dispatcher, mut sender) = split_port(channel, &config).expect("split should work");
        assert_eq!(sender.report_divisor(), 2);

        let report = GroundReport::default();
        assert!(!sender.send_report(&report).expect("skip"));
        assert!(sender.send_report(&report).expect("emit"));

        let mut ground = StreamChannel::open(
            ground,
            FrameConfig {
                nonblocking: false,
                read_timeout: Some(Duration::from_secs(5)),
                write_timeout: None,
            },
        )
        .expect("ground channel");
        let packet = ground.receive().expect("report should arrive");
        assert_eq!(packet.packet_type, PacketType::GroundReport);
        assert_eq!(packet.payload.len(), GroundReport::SIZE);
    }

    #[test]
    fn split_port_rejects_zero_divisor() {
        let (board, _ground) = LinkStream::pair().expect("pair should open");
        let channel = StreamChannel::open(board, FrameConfig::default()).expect("channel");
        let config = PortConfig {
            report_divisor: 0,
            ..PortConfig::default()
        };
        assert!(matches!(
            split_port(channel, &config),
            Err(PortError::InvalidDivisor)
        ));
    }

    #[test]
    fn connect_to_missing_socket_fails() {
        let err = connect("/tmp/rotorlink-no-such-socket.sock", FrameConfig::default())
            .expect_err("connect should fail");
        assert!(matches!(err, PortError::Transport(_)));
    }
}
