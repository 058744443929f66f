//! Property-Based Tests for roopstrap
//!
//! Uses proptest for testing invariants and edge cases
//!
//! These tests verify:
//! - Enum string round-trips (parse → to_string → parse)
//! - Patched lines equal the replacement text regardless of prior content
//! - Profile append is idempotent
//! - Stage ordering invariants

use proptest::prelude::*;

// =============================================================================
// Enum Property Tests
// =============================================================================

use roopstrap::types::{Architecture, FailurePolicy, Toggle};

fn architecture_strategy() -> impl Strategy<Value = Architecture> {
    prop_oneof![Just(Architecture::X86_64), Just(Architecture::Aarch64)]
}

fn failure_policy_strategy() -> impl Strategy<Value = FailurePolicy> {
    prop_oneof![Just(FailurePolicy::Continue), Just(FailurePolicy::FailFast)]
}

proptest! {
    /// Architecture: to_string → parse round-trip is identity
    #[test]
    fn architecture_roundtrip(arch in architecture_strategy()) {
        let parsed: Architecture = arch.to_string().parse().expect("Should parse");
        prop_assert_eq!(arch, parsed);
    }

    /// Architecture: installer name embeds the architecture string
    #[test]
    fn architecture_installer_name(arch in architecture_strategy()) {
        let name = arch.miniconda_installer();
        prop_assert!(name.starts_with("Miniconda3-latest-Linux-"));
        prop_assert!(name.ends_with(".sh"));
        prop_assert!(name.contains(&arch.to_string()));
    }

    /// FailurePolicy: to_string → parse round-trip is identity
    #[test]
    fn failure_policy_roundtrip(policy in failure_policy_strategy()) {
        let parsed: FailurePolicy = policy.to_string().parse().expect("Should parse");
        prop_assert_eq!(policy, parsed);
    }

    /// Toggle: bool → Toggle → bool is identity
    #[test]
    fn toggle_bool_roundtrip(value in any::<bool>()) {
        prop_assert_eq!(Toggle::from(value).is_enabled(), value);
    }
}

// =============================================================================
// Source Patch Property Tests
// =============================================================================

use roopstrap::config_file::ProvisionConfig;
use roopstrap::patch::{apply_rules, PatchError, PatchRule};

/// Strategy for file bodies; lines are non-empty so joining keeps the line count exact
fn source_lines(min: usize, max: usize) -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[ -~]{1,40}", min..max)
}

proptest! {
    /// Patched lines hold the replacement literals; every other line is untouched
    #[test]
    fn default_rules_set_share_lines(lines in source_lines(82, 150), trailing_newline in any::<bool>()) {
        let mut text = lines.join("\n");
        if trailing_newline {
            text.push('\n');
        }
        let rules = ProvisionConfig::default().patch_rules;

        let (patched, _) = apply_rules(&text, &rules).unwrap();
        let out: Vec<&str> = patched.lines().collect();

        prop_assert_eq!(out.len(), lines.len());
        prop_assert_eq!(out[77], "    share = True");
        prop_assert_eq!(out[81], "    gradio_interface.share = True");
        for (idx, line) in lines.iter().enumerate() {
            if idx != 77 && idx != 81 {
                prop_assert_eq!(out[idx], line.as_str());
            }
        }
        prop_assert_eq!(patched.ends_with('\n'), trailing_newline);
    }

    /// Applying the same rules twice changes nothing the second time
    #[test]
    fn line_rules_are_idempotent(lines in source_lines(82, 120)) {
        let text = lines.join("\n") + "\n";
        let rules = ProvisionConfig::default().patch_rules;

        let (once, _) = apply_rules(&text, &rules).unwrap();
        let (twice, changes) = apply_rules(&once, &rules).unwrap();
        prop_assert_eq!(&once, &twice);
        prop_assert!(changes.iter().all(|c| c.before == c.after));
    }

    /// A rule past the end of the file fails instead of padding
    #[test]
    fn short_files_are_rejected(lines in source_lines(0, 82)) {
        let text = lines.join("\n");
        let rules = ProvisionConfig::default().patch_rules;

        let result = apply_rules(&text, &rules);
        let is_out_of_range = matches!(result, Err(PatchError::LineOutOfRange { .. }));
        prop_assert!(is_out_of_range);
    }

    /// An arbitrary in-range line rule rewrites exactly that line
    #[test]
    fn single_line_rule(
        lines in source_lines(1, 60),
        pick in any::<prop::sample::Index>(),
        content in "[ -~]{0,40}",
    ) {
        let text = lines.join("\n") + "\n";
        let target = pick.index(lines.len()) + 1;

        let (patched, changes) = apply_rules(&text, &[PatchRule::line(target, content.clone())]).unwrap();
        let out: Vec<&str> = patched.lines().collect();

        prop_assert_eq!(out[target - 1], content.as_str());
        prop_assert_eq!(changes.len(), 1);
        prop_assert_eq!(changes[0].line, target);
    }
}

// =============================================================================
// Profile Property Tests
// =============================================================================

use roopstrap::profile::append_profile_line;

proptest! {
    /// The line is present after the first append and nothing changes after the second
    #[test]
    fn profile_append_is_idempotent(
        existing in prop::collection::vec("[ -~]{0,30}", 0..10),
        trailing_newline in any::<bool>(),
        line in "[A-Za-z_][A-Za-z0-9_=$:/ ]{0,30}[A-Za-z0-9]",
    ) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".bashrc");
        let mut original = existing.join("\n");
        if trailing_newline && !original.is_empty() {
            original.push('\n');
        }
        std::fs::write(&path, &original).unwrap();

        append_profile_line(&path, &line).unwrap();
        let after_first = std::fs::read_to_string(&path).unwrap();
        prop_assert!(after_first.starts_with(&original));
        prop_assert!(after_first.lines().any(|l| l.trim() == line));

        let appended = append_profile_line(&path, &line).unwrap();
        let after_second = std::fs::read_to_string(&path).unwrap();
        prop_assert!(!appended);
        prop_assert_eq!(after_first, after_second);
    }
}

// =============================================================================
// Stage Ordering Property Tests
// =============================================================================

use roopstrap::provision_state::{ProvisionContext, ProvisionStage};

proptest! {
    /// Advancing any number of times never moves backwards or past Completed
    #[test]
    fn advance_is_monotonic(steps in 0usize..20) {
        let mut ctx = ProvisionContext::new();
        let mut last = ctx.current_stage().order();
        for _ in 0..steps {
            if ctx.advance().is_err() {
                prop_assert!(ctx.is_complete());
                break;
            }
            let now = ctx.current_stage().order();
            prop_assert!(now > last);
            last = now;
        }
        prop_assert!(ctx.current_stage().order() <= ProvisionStage::Completed.order());
    }

    /// Jumping backwards to an earlier work stage is always rejected
    #[test]
    fn backward_transition_rejected(from in 1usize..9, back in 0usize..9) {
        let stages = ProvisionStage::work_stages();
        prop_assume!(back < from);
        let mut ctx = ProvisionContext::new();
        while ctx.current_stage() != stages[from] {
            ctx.advance().unwrap();
        }
        prop_assert!(ctx.transition_to(stages[back]).is_err());
        prop_assert_eq!(ctx.current_stage(), stages[from]);
    }
}
