// Fixture test program for crucible's own end-to-end tests.
// Usage: crucible-fixtures [crucible options]

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use std::{env, fs, process, thread};

use crucible::prelude::*;
use once_cell::sync::Lazy;

/// When set, the `hangs` fixture writes its pid to this file first.
const PID_FILE_ENV: &str = "CRUCIBLE_FIXTURE_PID_FILE";

static TAGS: Lazy<Arc<Attribute>> = Lazy::new(|| Attribute::list("tags"));

fn basics() -> Suite {
    Suite::new("basics")
        .test("passes", || expect(2 + 2 == 4, "arithmetic"))
        .test("fails", || expect_eq("left", "right"))
        .test("errors", || Err(BodyError::other("fixture error")))
        .test("panics", || panic!("fixture panic"))
}

fn tagged() -> Suite {
    Suite::new("tagged")
        .with_attrs([TAGS.with("unit")])
        .test_with("slow", [TAGS.with("slow")], || Ok(()))
        .test_with("fast", [TAGS.with("fast")], || Ok(()))
        .test_with("flaky", [skip_because("flaky on ci")], || Ok(()))
        .subsuite(Suite::new("nested").test("deep", || Ok(())))
}

fn hazards() -> Suite {
    Suite::new("hazards")
        .test("crashes", || process::abort())
        .test("after crash", || Ok(()))
        .test("hangs", || {
            if let Ok(path) = env::var(PID_FILE_ENV) {
                fs::write(&path, process::id().to_string()).map_err(BodyError::other)?;
            }
            loop {
                thread::sleep(Duration::from_secs(1));
            }
        })
        .test("prints", || {
            println!("hello from the child");
            eprintln!("and its stderr");
            fail("printed then failed")
        })
        .test("spawns a daemon", || {
            process::Command::new("sleep")
                .arg("5")
                .stdin(process::Stdio::null())
                .stdout(process::Stdio::null())
                .stderr(process::Stdio::null())
                .spawn()
                .map_err(BodyError::other)?;
            Ok(())
        })
}

fn main() -> ExitCode {
    drive_tests(vec![basics(), tagged(), hazards()])
}
