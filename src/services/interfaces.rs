//! Rewrite of the persistent interfaces configuration
//!
//! The existing file is transformed in a single forward pass. Two marker lines
//! delimit the blocks managed by the agent; everything else is owned by the
//! operator and copied through untouched.

use crate::services::settings::{Mode, ProvisioningSettings};

pub const ETH_MARKER: &str = "#RPAC ETH";
pub const WIFI_MARKER: &str = "#RPAC WIFI";

const ETH_INTERFACE: &str = "eth0";
const WIFI_INTERFACE: &str = "wlan0";
const STATIC_NETMASK: &str = "255.255.255.0";
const DNS_SERVERS: &str = "8.8.8.8 8.8.4.4";

/// Position of the rewrite pass within the source file
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RewriteState {
    /// Copying operator content ahead of the ethernet marker
    Preamble,
    /// Ethernet marker seen, managed ethernet block not yet emitted
    EthBlock,
    /// Between the ethernet and the wifi marker
    PostEth,
    /// Wifi marker seen, managed wifi block not yet emitted
    WifiBlock,
    /// Copying operator content after the wifi marker
    PostWifi,
}

/// Outcome of feeding one line or resolving one synthetic state
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    Next(RewriteState),
    Stop,
}

/// Rewrite text `source` for `settings`, returning the new file's lines
pub fn rewrite(source: &str, settings: &ProvisioningSettings) -> Vec<String> {
    let mut lines = Vec::new();
    rewrite_into(source.as_bytes(), settings, |line| {
        lines.push(String::from_utf8_lossy(line).into_owned())
    });
    lines
}

/// Rewrite `source` for `settings`, handing every emitted line to `emit`
///
/// Operator lines are passed through as raw bytes, so content in any
/// encoding survives the pass unchanged.
pub fn rewrite_into<F>(source: &[u8], settings: &ProvisioningSettings, mut emit: F)
where
    F: FnMut(&[u8]),
{
    let mut state = RewriteState::Preamble;

    for line in source_lines(source) {
        match step(state, line, settings, &mut emit) {
            Transition::Next(next) => state = next,
            Transition::Stop => return,
        }
    }
}

/// Split `source` into lines without their `\n` or `\r\n` terminator
pub fn source_lines(source: &[u8]) -> impl Iterator<Item = &[u8]> {
    source.split_inclusive(|&b| b == b'\n').map(|line| {
        let line = line.strip_suffix(b"\n").unwrap_or(line);
        line.strip_suffix(b"\r").unwrap_or(line)
    })
}

/// Feed one source line to the state machine
///
/// Synthetic states entered by the line are resolved before returning, so the
/// returned state is always one that consumes input.
pub fn step<F>(
    state: RewriteState,
    line: &[u8],
    settings: &ProvisioningSettings,
    emit: &mut F,
) -> Transition
where
    F: FnMut(&[u8]),
{
    let next = match state {
        RewriteState::Preamble => preamble(line, emit),
        RewriteState::PostEth => post_eth(line, settings.eth_mode, emit),
        RewriteState::PostWifi => post_wifi(line, emit),
        RewriteState::EthBlock | RewriteState::WifiBlock => state,
    };

    settle(next, settings, emit)
}

fn settle<F>(state: RewriteState, settings: &ProvisioningSettings, emit: &mut F) -> Transition
where
    F: FnMut(&[u8]),
{
    match state {
        RewriteState::EthBlock => settle(eth_block(settings, emit), settings, emit),
        RewriteState::WifiBlock => wifi_block(settings, emit),
        consuming => Transition::Next(consuming),
    }
}

pub fn preamble<F>(line: &[u8], emit: &mut F) -> RewriteState
where
    F: FnMut(&[u8]),
{
    emit(line);

    if line.starts_with(ETH_MARKER.as_bytes()) {
        RewriteState::EthBlock
    } else {
        RewriteState::Preamble
    }
}

pub fn eth_block<F>(settings: &ProvisioningSettings, emit: &mut F) -> RewriteState
where
    F: FnMut(&[u8]),
{
    if settings.eth_mode.emits_block() {
        emit_interface(
            ETH_INTERFACE,
            settings.eth_mode,
            &settings.eth_address,
            &settings.eth_gateway,
            emit,
        );
    }

    RewriteState::PostEth
}

pub fn post_eth<F>(line: &[u8], eth_mode: Mode, emit: &mut F) -> RewriteState
where
    F: FnMut(&[u8]),
{
    if line.starts_with(WIFI_MARKER.as_bytes()) {
        emit(line);
        return RewriteState::WifiBlock;
    }

    // the original ethernet block only survives when ethernet is left alone
    if eth_mode == Mode::Leave {
        emit(line);
    }

    RewriteState::PostEth
}

pub fn wifi_block<F>(settings: &ProvisioningSettings, emit: &mut F) -> Transition
where
    F: FnMut(&[u8]),
{
    match settings.wifi_mode {
        Mode::Leave => Transition::Next(RewriteState::PostWifi),
        Mode::Down => Transition::Stop,
        mode => {
            emit_interface(
                WIFI_INTERFACE,
                mode,
                &settings.wifi_address,
                &settings.wifi_gateway,
                emit,
            );
            emit(format!("  wpa-ssid {}", settings.wifi_ssid).as_bytes());
            emit(format!("  wpa-psk {}", settings.wifi_psk).as_bytes());
            Transition::Stop
        }
    }
}

pub fn post_wifi<F>(line: &[u8], emit: &mut F) -> RewriteState
where
    F: FnMut(&[u8]),
{
    emit(line);
    RewriteState::PostWifi
}

fn emit_interface<F>(name: &str, mode: Mode, address: &str, gateway: &str, emit: &mut F)
where
    F: FnMut(&[u8]),
{
    emit(format!("auto {name}").as_bytes());

    if mode == Mode::Static {
        emit(format!("iface {name} inet static").as_bytes());
        emit(format!("  address {address}").as_bytes());
        emit(format!("  gateway {gateway}").as_bytes());
        emit(format!("  netmask {STATIC_NETMASK}").as_bytes());
        emit(format!("  dns-nameservers {DNS_SERVERS}").as_bytes());
    } else {
        emit(format!("iface {name} inet dhcp").as_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = "\
# interfaces(5) file used by ifup(8) and ifdown(8)
auto lo
iface lo inet loopback
#RPAC ETH
auto eth0
iface eth0 inet dhcp
#RPAC WIFI
auto wlan0
iface wlan0 inet dhcp
  wpa-ssid OLD
  wpa-psk oldsecret
# operator postamble
";

    fn settings(eth_mode: Mode, wifi_mode: Mode) -> ProvisioningSettings {
        ProvisioningSettings {
            eth_mode,
            eth_address: "10.4.10.170".to_string(),
            eth_gateway: "10.4.10.1".to_string(),
            wifi_mode,
            wifi_address: "10.4.20.170".to_string(),
            wifi_gateway: "10.4.20.1".to_string(),
            wifi_ssid: "NET".to_string(),
            wifi_psk: "secret".to_string(),
            ..Default::default()
        }
    }

    fn joined(lines: &[String]) -> String {
        lines.iter().map(|line| format!("{line}\n")).collect()
    }

    fn text(line: &[u8]) -> String {
        String::from_utf8_lossy(line).into_owned()
    }

    mod transitions {
        use super::*;

        #[test]
        fn preamble_advances_on_eth_marker() {
            let mut out = Vec::new();
            let next = preamble(b"#RPAC ETH managed below", &mut |l: &[u8]| {
                out.push(text(l))
            });

            assert_eq!(next, RewriteState::EthBlock);
            assert_eq!(out, vec!["#RPAC ETH managed below"]);
        }

        #[test]
        fn preamble_stays_on_other_lines() {
            let next = preamble(b"auto lo", &mut |_: &[u8]| {});
            assert_eq!(next, RewriteState::Preamble);
        }

        #[test]
        fn post_eth_drops_lines_unless_left() {
            let mut out = Vec::new();
            let mut emit = |l: &[u8]| out.push(text(l));

            assert_eq!(post_eth(b"auto eth0", Mode::Dhcp, &mut emit), RewriteState::PostEth);
            assert_eq!(post_eth(b"auto eth0", Mode::Down, &mut emit), RewriteState::PostEth);
            assert_eq!(post_eth(b"auto eth0", Mode::Leave, &mut emit), RewriteState::PostEth);
            assert_eq!(out, vec!["auto eth0"]);
        }

        #[test]
        fn post_eth_advances_on_wifi_marker_in_every_mode() {
            for mode in [Mode::Static, Mode::Dhcp, Mode::Leave, Mode::Down, Mode::Other] {
                let mut out = Vec::new();
                let next = post_eth(WIFI_MARKER.as_bytes(), mode, &mut |l: &[u8]| out.push(text(l)));

                assert_eq!(next, RewriteState::WifiBlock);
                assert_eq!(out, vec![WIFI_MARKER]);
            }
        }

        #[test]
        fn eth_block_is_silent_for_leave_and_down() {
            for mode in [Mode::Leave, Mode::Down] {
                let mut out: Vec<String> = Vec::new();
                let next = eth_block(&settings(mode, Mode::Leave), &mut |l: &[u8]| {
                    out.push(text(l))
                });

                assert_eq!(next, RewriteState::PostEth);
                assert!(out.is_empty());
            }
        }

        #[test]
        fn wifi_block_transitions() {
            let mut sink = |_: &[u8]| {};

            assert_eq!(
                wifi_block(&settings(Mode::Leave, Mode::Leave), &mut sink),
                Transition::Next(RewriteState::PostWifi)
            );
            assert_eq!(
                wifi_block(&settings(Mode::Leave, Mode::Down), &mut sink),
                Transition::Stop
            );
            assert_eq!(
                wifi_block(&settings(Mode::Leave, Mode::Dhcp), &mut sink),
                Transition::Stop
            );
        }

        #[test]
        fn unknown_mode_emits_dhcp_block() {
            let mut out = Vec::new();
            eth_block(&settings(Mode::Other, Mode::Leave), &mut |l: &[u8]| {
                out.push(text(l))
            });

            assert_eq!(out, vec!["auto eth0", "iface eth0 inet dhcp"]);
        }
    }

    mod passes {
        use super::*;

        #[test]
        fn leave_leave_is_byte_identical() {
            let lines = rewrite(SOURCE, &settings(Mode::Leave, Mode::Leave));
            assert_eq!(joined(&lines), SOURCE);
        }

        #[test]
        fn static_eth_block_has_fixed_layout() {
            let lines = rewrite(SOURCE, &settings(Mode::Static, Mode::Leave));
            let start = lines
                .iter()
                .position(|l| l == ETH_MARKER)
                .expect("should keep eth marker");

            assert_eq!(
                &lines[start + 1..start + 7],
                &[
                    "auto eth0",
                    "iface eth0 inet static",
                    "  address 10.4.10.170",
                    "  gateway 10.4.10.1",
                    "  netmask 255.255.255.0",
                    "  dns-nameservers 8.8.8.8 8.8.4.4",
                ]
            );
            assert_eq!(lines.iter().filter(|l| l.contains("address")).count(), 1);
            assert_eq!(lines.iter().filter(|l| l.contains("gateway")).count(), 1);
            assert_eq!(lines[start + 7], WIFI_MARKER);
        }

        #[test]
        fn managed_wifi_terminates_the_pass() {
            for mode in [Mode::Static, Mode::Dhcp] {
                let lines = rewrite(SOURCE, &settings(Mode::Leave, mode));

                assert_eq!(lines.last().map(String::as_str), Some("  wpa-psk secret"));
                assert!(!lines.iter().any(|l| l.contains("OLD")));
                assert!(!lines.iter().any(|l| l == "# operator postamble"));
            }
        }

        #[test]
        fn wifi_down_drops_everything_after_the_marker() {
            let lines = rewrite(SOURCE, &settings(Mode::Leave, Mode::Down));
            assert_eq!(lines.last().map(String::as_str), Some(WIFI_MARKER));
        }

        #[test]
        fn wifi_leave_keeps_the_tail_in_order() {
            let lines = rewrite(SOURCE, &settings(Mode::Dhcp, Mode::Leave));
            let tail: Vec<&str> = SOURCE
                .lines()
                .skip_while(|l| !l.starts_with(WIFI_MARKER))
                .collect();
            let out_tail: Vec<&str> = lines
                .iter()
                .map(String::as_str)
                .skip_while(|l| !l.starts_with(WIFI_MARKER))
                .collect();

            assert_eq!(out_tail, tail);
        }

        #[test]
        fn eth_dhcp_wifi_static_scenario() {
            let source = "#RPAC ETH\n#RPAC WIFI\n# trailing comment\n";
            let settings = ProvisioningSettings {
                eth_mode: Mode::Dhcp,
                wifi_mode: Mode::Static,
                wifi_address: "192.168.1.20".to_string(),
                wifi_gateway: "192.168.1.1".to_string(),
                wifi_ssid: "NET".to_string(),
                wifi_psk: "secret".to_string(),
                ..Default::default()
            };

            assert_eq!(
                rewrite(source, &settings),
                vec![
                    "#RPAC ETH",
                    "auto eth0",
                    "iface eth0 inet dhcp",
                    "#RPAC WIFI",
                    "auto wlan0",
                    "iface wlan0 inet static",
                    "  address 192.168.1.20",
                    "  gateway 192.168.1.1",
                    "  netmask 255.255.255.0",
                    "  dns-nameservers 8.8.8.8 8.8.4.4",
                    "  wpa-ssid NET",
                    "  wpa-psk secret",
                ]
            );
        }

        #[test]
        fn missing_markers_preserve_the_file() {
            let source = "auto lo\niface lo inet loopback\n";
            let lines = rewrite(source, &settings(Mode::Static, Mode::Static));

            assert_eq!(joined(&lines), source);
        }

        #[test]
        fn missing_wifi_marker_keeps_eth_rewrite() {
            let source = "#RPAC ETH\nauto eth0\niface eth0 inet dhcp\n";
            let lines = rewrite(source, &settings(Mode::Static, Mode::Static));

            assert_eq!(lines.len(), 7);
            assert_eq!(lines[2], "iface eth0 inet static");
        }

        #[test]
        fn emitted_lines_reach_the_sink_in_order() {
            let mut seen = Vec::new();
            let settings = settings(Mode::Dhcp, Mode::Dhcp);
            rewrite_into(SOURCE.as_bytes(), &settings, |line| seen.push(text(line)));

            assert_eq!(seen, rewrite(SOURCE, &settings));
        }

        #[test]
        fn non_utf8_operator_lines_survive_unchanged() {
            let mut source = b"# caf\xe9 operator note\n".to_vec();
            source.extend_from_slice(SOURCE.as_bytes());

            let mut out = Vec::new();
            rewrite_into(&source, &settings(Mode::Leave, Mode::Leave), |line| {
                out.extend_from_slice(line);
                out.push(b'\n');
            });

            assert_eq!(out, source);
        }

        #[test]
        fn crlf_terminators_are_stripped() {
            let source = b"auto lo\r\n#RPAC ETH\r\n#RPAC WIFI\r\n";
            let lines: Vec<String> = source_lines(source).map(text).collect();

            assert_eq!(lines, vec!["auto lo", "#RPAC ETH", "#RPAC WIFI"]);
        }

        #[test]
        fn unterminated_last_line_is_kept() {
            let lines: Vec<String> = source_lines(b"auto lo\niface lo inet loopback")
                .map(text)
                .collect();

            assert_eq!(lines, vec!["auto lo", "iface lo inet loopback"]);
            assert_eq!(source_lines(b"").count(), 0);
        }
    }
}
