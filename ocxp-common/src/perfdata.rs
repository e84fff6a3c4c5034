use regex::{Match, Regex};

/// One parsed performance datum from a plugin perfdata string.
#[derive(Debug, Clone, PartialEq)]
pub struct PerfSample {
    pub label: String,
    pub value: f64,
    pub uom: Option<String>,
    pub warn: Option<f64>,
    pub crit: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

lazy_static! {
    // label=value[uom][;warn[;crit[;min[;max]]]], whitespace separated.
    // warn/crit additionally admit range syntax (':', '~', '@'), which is
    // consumed but never parsed into a number.
    static ref SAMPLE_RE: Regex = Regex::new(
        r"([^=]+)=(U|[-0-9.,]+)([\p{L}/%]*)(?:;([-0-9.,:~@]*))?(?:;([-0-9.,:~@]*))?(?:;([-0-9.,]*))?(?:;([-0-9.,]*))?\s*"
    )
    .expect("perfdata regex");
}

/// Tokenizes a perfdata payload into samples, in input order.
///
/// Never fails: samples with an unparsable value (including the literal
/// `U`) are dropped, unparsable thresholds are simply absent.
pub fn parse(perfdata: &str) -> Vec<PerfSample> {
    let mut samples = Vec::new();
    for caps in SAMPLE_RE.captures_iter(perfdata.trim_start()) {
        let value = match caps[2].parse::<f64>() {
            Ok(value) => value,
            Err(_) => {
                debug!("dropping sample '{}': unparsable value '{}'", &caps[1], &caps[2]);
                continue;
            }
        };
        let uom = match &caps[3] {
            "" => None,
            uom => Some(uom.to_string()),
        };
        samples.push(PerfSample {
            label: caps[1].to_string(),
            value,
            uom,
            warn: threshold(caps.get(4)),
            crit: threshold(caps.get(5)),
            min: threshold(caps.get(6)),
            max: threshold(caps.get(7)),
        });
    }
    samples
}

fn threshold(capture: Option<Match>) -> Option<f64> {
    capture.and_then(|m| m.as_str().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_filesystem_samples_with_full_thresholds() {
        let samples = parse("/=2643MB;5948;5958;0;5968 /boot=68MB;88;93;0;98");
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].label, "/");
        assert_eq!(samples[0].value, 2643.0);
        assert_eq!(samples[0].uom.as_deref(), Some("MB"));
        assert_eq!(samples[0].warn, Some(5948.0));
        assert_eq!(samples[0].crit, Some(5958.0));
        assert_eq!(samples[0].min, Some(0.0));
        assert_eq!(samples[0].max, Some(5968.0));
        assert_eq!(samples[1].label, "/boot");
        assert_eq!(samples[1].value, 68.0);
    }

    #[test]
    fn unknown_value_drops_the_sample() {
        assert!(parse("cpu=U;;;;").is_empty());
    }

    #[test]
    fn empty_input_yields_no_samples() {
        assert!(parse("").is_empty());
    }

    #[test]
    fn sample_without_thresholds() {
        let samples = parse("rta=0.052ms");
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].value, 0.052);
        assert_eq!(samples[0].uom.as_deref(), Some("ms"));
        assert_eq!(samples[0].warn, None);
        assert_eq!(samples[0].max, None);
    }

    #[test]
    fn partial_thresholds_leave_the_rest_absent() {
        let samples = parse("time=1.2s;5");
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].warn, Some(5.0));
        assert_eq!(samples[0].crit, None);
    }

    #[test]
    fn empty_threshold_slots_are_skipped() {
        let samples = parse("conns=17;;100");
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].warn, None);
        assert_eq!(samples[0].crit, Some(100.0));
    }

    #[test]
    fn range_notation_thresholds_are_absent() {
        let samples = parse("load=5;0:10;~:20;0;30");
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].warn, None);
        assert_eq!(samples[0].crit, None);
        assert_eq!(samples[0].min, Some(0.0));
        assert_eq!(samples[0].max, Some(30.0));
    }

    #[test]
    fn negative_and_missing_uom() {
        let samples = parse("temp=-3.5;;;-20;60");
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].value, -3.5);
        assert_eq!(samples[0].uom, None);
        assert_eq!(samples[0].min, Some(-20.0));
        assert_eq!(samples[0].max, Some(60.0));
    }

    #[test]
    fn label_is_any_run_without_equals() {
        let samples = parse("'C: used space'=5%;90;95");
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].label, "'C: used space'");
        assert_eq!(samples[0].uom.as_deref(), Some("%"));
    }

    #[test]
    fn compound_uom_with_slash() {
        let samples = parse("rate=3MB/s");
        assert_eq!(samples[0].uom.as_deref(), Some("MB/s"));
    }

    #[test]
    fn unparsable_value_does_not_stop_lexing() {
        let samples = parse("bad=1.2.3 good=7;1;2");
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].label, "good");
        assert_eq!(samples[0].value, 7.0);
    }
}
