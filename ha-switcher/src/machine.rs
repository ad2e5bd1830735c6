//! Pure predicates over the failover handshake (§4.4): `NotSwitching`,
//! `CanStart`, `IsEnd`, each computed over the local node's same-type pair
//! `{local, oppo}` (not the whole cluster — §4.1's `SwitchMasterAndSlave`
//! happens to touch every non-zookeeper node at once, but the agreement
//! protocol itself only ever needs to converge within one type's pair; see
//! DESIGN.md for why the pair, not the cluster, is the scope of `S`).
//!
//! `CanStart` is positional, not a plain set-membership test over the pair:
//! the *opposite* side must always show `start`/`end` (a missing or null
//! opposite is never a go-ahead — a lone `end` with no partner in sight is
//! not agreement, it's a node talking to itself). The *local* side may
//! legitimately still be `None`: that's §4.4's "forced switch", reached
//! when `propose` declined to self-write because `NotSwitching` was
//! already false (the opposite had moved past the point where a fresh
//! self-proposal makes sense) — `Switcher::execute` detects `forced` by
//! the same `local.is_none()` test and catches the local record up to
//! `start` before running `DoSwitch`. A local `start`/`end` with the
//! opposite missing never satisfies `CanStart`, matching the literal
//! `S = {start} ∨ S = {start, end}` reading once the opposite is known.

use ha_proto::SwitchStatus;

/// `S` as used by this crate: the local node's own value and its opposite's,
/// if an opposite exists. `not_switching` and `is_end` treat the two
/// positions symmetrically; `can_start` does not (see its doc comment).
pub fn pair(local: Option<SwitchStatus>, oppo: Option<SwitchStatus>) -> [Option<SwitchStatus>; 2] {
    [local, oppo]
}

/// `NotSwitching(S) ≡ S ⊆ {null} ∨ S ⊆ {null, start}` — computed over the
/// full pair including `None`s, exactly as spec.md states it.
pub fn not_switching(s: &[Option<SwitchStatus>]) -> bool {
    s.iter().all(|v| v.is_none()) || s.iter().all(|v| matches!(v, None | Some(SwitchStatus::Start)))
}

/// `CanStart(S) ≡ S = {start} ∨ S = {start, end}`. `s[0]` is local, `s[1]`
/// is the opposite (see `pair`); the opposite must be present and in
/// `{start, end}`, the local side may be `None` (forced switch) or must
/// itself be in `{start, end}`, and at least one side must be `start`.
pub fn can_start(s: &[Option<SwitchStatus>]) -> bool {
    let (local, oppo) = (s[0], s[1]);
    let Some(oppo) = oppo else { return false };
    if !matches!(oppo, SwitchStatus::Start | SwitchStatus::End) {
        return false;
    }
    match local {
        None => true,
        Some(l) => matches!(l, SwitchStatus::Start | SwitchStatus::End) && (l == SwitchStatus::Start || oppo == SwitchStatus::Start),
    }
}

/// `IsEnd(S) ≡ start ∉ S`, evaluated over the non-null values.
pub fn is_end(s: &[Option<SwitchStatus>]) -> bool {
    !s.iter().flatten().any(|v| *v == SwitchStatus::Start)
}
