//! Small stateless helpers shared across components.

/// Converts a team number into the fallback roboRIO address `10.TE.AM.2`.
///
/// This is the last-resort address in the resolution order of §4.2; USB mode
/// and mDNS are tried first by the caller.
pub(crate) fn ip_from_team_number(team: u16) -> String {
    let te = team / 100;
    let am = team % 100;
    format!("10.{te}.{am}.2")
}

/// The mDNS hostname a roboRIO advertises for a given team number.
pub(crate) fn mdns_hostname(team: u16) -> String {
    format!("roboRIO-{team}-FRC.local")
}

/// Packs booleans LSB-first into `ceil(len/8)` bytes, byte 0 holding bits 0..8.
pub(crate) fn pack_bits(values: &[bool]) -> Vec<u8> {
    let mut out = vec![0u8; values.len().div_ceil(8)];
    for (i, &v) in values.iter().enumerate() {
        if v {
            out[i / 8] |= 1 << (i % 8);
        }
    }
    out
}

/// Inverse of [`pack_bits`]: unpacks `count` LSB-first bits from `bytes`.
pub(crate) fn unpack_bits(bytes: &[u8], count: usize) -> Vec<bool> {
    (0..count)
        .map(|i| bytes.get(i / 8).is_some_and(|b| b & (1 << (i % 8)) != 0))
        .collect()
}
