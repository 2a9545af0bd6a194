use std::cmp::Ordering;

// Round to n significant digits
// https://stackoverflow.com/questions/28655362/how-does-one-round-a-floating-point-number-to-a-specified-number-of-digits
pub fn precision_f64(x: f64, decimals: u32) -> f64 {
    if x == 0. || decimals == 0 {
        0.
    } else {
        let shift = decimals as i32 - x.abs().log10().ceil() as i32;
        let shift_factor = 10_f64.powi(shift);

        (x * shift_factor).round() / shift_factor
    }
}

//NOTE: This should be parsed by clap automatically, but Option<String> parsing is not supported out of the box as of now
pub fn strip_prefix(prefix: Option<String>) -> Option<String> {
    if let Some(prefix) = prefix {
        match prefix.as_ref() {
            "" => None,
            "\\0" => None,
            v => Some(v.to_string()),
        }
    } else {
        None
    }
}

/// Natural order for chromosome labels, chr2 < chr10
pub fn compare_chromosomes(a: &str, b: &str) -> Ordering {
    alphanumeric_sort::compare_str(a, b)
}

/// Tokens that stand for a missing value in engine listings and genotype tables
pub fn is_missing_token(token: &str) -> bool {
    matches!(
        token,
        "-" | "--" | "." | "NA" | "na" | "NaN" | "nan" | "U" | "*"
    )
}
