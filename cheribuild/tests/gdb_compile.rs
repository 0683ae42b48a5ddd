//! The GDB compile step hides the SDK's binutils while `make all-gdb` runs
//! and puts them back afterwards, whether or not make succeeds.

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use cheribuild::core::target::CrossTarget;
use cheribuild::io::runner::CommandRunner;
use cheribuild::recipes::gdb::SHADOWED_TOOLS;
use cheribuild::recipes::{Gdb, Recipe};
use cheribuild::resolve::resolve_project;
use cheribuild::test_support::{RecordingRunner, populate_sdk_bin, test_context};

/// Every subset of the shadowed tools, as a bitmask over `SHADOWED_TOOLS`.
fn subsets() -> impl Iterator<Item = Vec<&'static str>> {
    (0..1u32 << SHADOWED_TOOLS.len()).map(|mask| {
        SHADOWED_TOOLS
            .iter()
            .enumerate()
            .filter(|(i, _)| mask & (1 << i) != 0)
            .map(|(_, name)| *name)
            .collect()
    })
}

/// (tool, present as itself, present as `.backup`) for each shadowed tool.
fn snapshot(bin: &Path) -> Snapshot {
    SHADOWED_TOOLS
        .iter()
        .map(|name| {
            (
                (*name).to_string(),
                bin.join(name).exists(),
                bin.join(format!("{name}.backup")).exists(),
            )
        })
        .collect()
}

type Snapshot = Vec<(String, bool, bool)>;

fn probing_runner(bin: PathBuf, fail: bool) -> (RecordingRunner, Rc<RefCell<Snapshot>>) {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    let base = if fail {
        RecordingRunner::failing_on("all-gdb")
    } else {
        RecordingRunner::new()
    };
    let runner = base.with_probe(move |inv| {
        if inv.args.iter().any(|a| a == "all-gdb") {
            *sink.borrow_mut() = snapshot(&bin);
        }
    });
    (runner, seen)
}

fn check_subset(present: &[&str], fail: bool) {
    let temp = tempfile::tempdir().expect("tempdir");
    let bin = populate_sdk_bin(temp.path(), present);
    let ctx = test_context(temp.path(), CrossTarget::Mips64);
    let project = resolve_project(&Gdb, &ctx).expect("resolve");
    let before = snapshot(&bin);

    let (runner, seen) = probing_runner(bin.clone(), fail);
    let result = Gdb.compile(&ctx, &project, &runner);
    assert_eq!(result.is_err(), fail, "present={present:?}");

    let during = seen.borrow().clone();
    assert_eq!(during.len(), SHADOWED_TOOLS.len(), "make did not run: {present:?}");
    for (name, visible, backed_up) in during {
        let expected = present.contains(&name.as_str());
        assert!(!visible, "{name} visible during make (present={present:?})");
        assert_eq!(backed_up, expected, "{name} backup (present={present:?})");
    }

    assert_eq!(snapshot(&bin), before, "not restored (present={present:?}, fail={fail})");
    for name in present {
        let content = fs::read_to_string(bin.join(name)).expect("read restored tool");
        assert!(content.contains(&format!("# {name}")));
    }
    assert_eq!(runner.invocations().len(), 1);
    assert!(!runner.pretend());
}

#[test]
fn tools_hidden_during_make_and_restored_after_success() {
    for present in subsets() {
        check_subset(&present, false);
    }
}

#[test]
fn tools_restored_after_failed_make() {
    for present in subsets() {
        check_subset(&present, true);
    }
}

#[test]
fn missing_sdk_bin_dir_is_not_an_error() {
    let temp = tempfile::tempdir().expect("tempdir");
    let ctx = test_context(temp.path(), CrossTarget::Mips64);
    let project = resolve_project(&Gdb, &ctx).expect("resolve");
    let runner = RecordingRunner::new();
    Gdb.compile(&ctx, &project, &runner).expect("compile");
    let calls = runner.invocations();
    assert_eq!(calls[0].program, "make");
    assert!(calls[0].args.iter().any(|a| a == "all-gdb"));
}
