//! Sink selection from the audio server's `list sinks short` output.
//!
//! Each line is `<index> <sink-id> <driver> <format> <state>`, separated by
//! whitespace. Only the second column is used.

/// Vendor and chipset names the headset's sink is registered under.
pub const DEFAULT_SINK_FRAGMENTS: &[&str] = &["XiiSound", "Weltrend", "Redragon"];

/// Returns the sink id of the first line containing any of `fragments`.
///
/// Matching is a case-sensitive substring test over the whole line. Lines
/// that match but have fewer than two columns are skipped. `None` means the
/// audio server has not registered the headset (yet).
pub fn resolve_sink<S: AsRef<str>>(output: &str, fragments: &[S]) -> Option<String> {
    output
        .lines()
        .filter(|line| fragments.iter().any(|f| line.contains(f.as_ref())))
        .find_map(|line| line.split_whitespace().nth(1))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = "\
48\talsa_output.pci-0000_00_1f.3.analog-stereo\tPipeWire\ts32le 2ch 48000Hz\tSUSPENDED
71\talsa_output.usb-XiiSound_Technology_Corporation_H878_Wireless_headset-00.analog-stereo\tPipeWire\ts16le 2ch 48000Hz\tRUNNING
90\talsa_output.usb-Redragon_H510-00.analog-stereo\tPipeWire\ts16le 2ch 48000Hz\tIDLE
";

    #[test]
    fn picks_first_matching_line() {
        let sink = resolve_sink(LISTING, DEFAULT_SINK_FRAGMENTS);
        assert_eq!(
            sink.as_deref(),
            Some("alsa_output.usb-XiiSound_Technology_Corporation_H878_Wireless_headset-00.analog-stereo")
        );
    }

    #[test]
    fn fragment_order_does_not_change_stream_order() {
        let sink = resolve_sink(LISTING, &["Redragon", "XiiSound"]);
        assert!(sink.unwrap().contains("XiiSound"));
    }

    #[test]
    fn match_is_case_sensitive() {
        assert_eq!(resolve_sink(LISTING, &["xiisound", "redragon"]), None);
    }

    #[test]
    fn no_match_is_none() {
        let listing = "48\talsa_output.pci-0000_00_1f.3.analog-stereo\tPipeWire\ts32le 2ch 48000Hz\tSUSPENDED\n";
        assert_eq!(resolve_sink(listing, DEFAULT_SINK_FRAGMENTS), None);
        assert_eq!(resolve_sink("", DEFAULT_SINK_FRAGMENTS), None);
    }

    #[test]
    fn single_column_match_is_skipped() {
        let listing = "Redragon\n12 alsa_output.usb-Weltrend_Headset-00 PipeWire\n";
        assert_eq!(
            resolve_sink(listing, DEFAULT_SINK_FRAGMENTS).as_deref(),
            Some("alsa_output.usb-Weltrend_Headset-00")
        );
    }

    #[test]
    fn owned_fragments() {
        let fragments = vec!["Weltrend".to_string()];
        let listing = "3 alsa_output.usb-Weltrend_Semiconductor-00 PipeWire s16le IDLE";
        assert_eq!(
            resolve_sink(listing, &fragments).as_deref(),
            Some("alsa_output.usb-Weltrend_Semiconductor-00")
        );
    }
}
