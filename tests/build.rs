//! End-to-end tests for `cabin build`.

mod helpers;

use helpers::*;

#[test]
fn build_hello_world() {
    if !have_build_tools() {
        eprintln!("skipping: build tools not available");
        return;
    }

    let tmp = TempDir::new("hello_world");
    let project = &tmp.path;
    write_file(&project.join("cabin.toml"), &manifest("hello_world"));
    write_file(&project.join("src/main.cc"), HELLO_MAIN);

    let output = run_cabin(&["build"], project);
    let stderr = stderr_of(&output);
    assert!(output.status.success(), "{stderr}");
    assert!(stderr.contains("Analyzing project dependencies..."), "{stderr}");
    assert!(stderr.contains("Compiling hello_world v0.1.0"), "{stderr}");
    assert!(stderr.contains("Finished `dev` profile"), "{stderr}");

    let out_dir = project.join("cabin-out/dev");
    for file in ["build.ninja", "config.ninja", "rules.ninja", "targets.ninja"] {
        assert!(out_dir.join(file).is_file(), "{file} missing");
    }
    assert!(out_dir.join("hello_world").is_file());
    assert!(out_dir.join("hello_world.d/main.o").is_file());
    assert!(project.join("cabin-out/compile_commands.json").is_file());
    // No library sources, no archive.
    assert!(!out_dir.join("libhello_world.a").exists());

    let run = std::process::Command::new(out_dir.join("hello_world"))
        .output()
        .expect("failed to run built binary");
    assert_eq!(String::from_utf8_lossy(&run.stdout), "Hello, world!\n");
}

#[test]
fn rebuild_is_a_no_op_when_up_to_date() {
    if !have_build_tools() {
        eprintln!("skipping: build tools not available");
        return;
    }

    let tmp = TempDir::new("up_to_date");
    let project = &tmp.path;
    write_file(&project.join("cabin.toml"), &manifest("up_to_date"));
    write_file(&project.join("src/main.cc"), HELLO_MAIN);

    let first = run_cabin(&["build"], project);
    assert!(first.status.success(), "{}", stderr_of(&first));
    assert!(stderr_of(&first).contains("Compiling"));

    let second = run_cabin(&["build"], project);
    let stderr = stderr_of(&second);
    assert!(second.status.success(), "{stderr}");
    assert!(!stderr.contains("Compiling"), "{stderr}");
    assert!(stderr.contains("Finished `dev` profile"), "{stderr}");
}

#[test]
fn library_only_project_builds_an_archive() {
    if !have_build_tools() {
        eprintln!("skipping: build tools not available");
        return;
    }

    let tmp = TempDir::new("widget");
    let project = &tmp.path;
    write_file(&project.join("cabin.toml"), &manifest("widget"));
    write_file(
        &project.join("lib/widget.cc"),
        "int widget_value() { return 42; }\n",
    );

    let output = run_cabin(&["build"], project);
    assert!(output.status.success(), "{}", stderr_of(&output));

    let out_dir = project.join("cabin-out/dev");
    assert!(out_dir.join("libwidget.a").is_file());
    assert!(!out_dir.join("widget").exists());
}

#[test]
fn release_profile_uses_its_own_out_tree() {
    if !have_build_tools() {
        eprintln!("skipping: build tools not available");
        return;
    }

    let tmp = TempDir::new("release_tree");
    let project = &tmp.path;
    write_file(&project.join("cabin.toml"), &manifest("release_tree"));
    write_file(&project.join("src/main.cc"), HELLO_MAIN);

    let output = run_cabin(&["build", "--release"], project);
    let stderr = stderr_of(&output);
    assert!(output.status.success(), "{stderr}");
    assert!(stderr.contains("Finished `release` profile [optimized]"), "{stderr}");
    assert!(project.join("cabin-out/release/release_tree").is_file());
    assert!(!project.join("cabin-out/dev").exists());
}

#[test]
fn touching_a_source_retriggers_compilation() {
    if !have_build_tools() {
        eprintln!("skipping: build tools not available");
        return;
    }

    let tmp = TempDir::new("retrigger");
    let project = &tmp.path;
    write_file(&project.join("cabin.toml"), &manifest("retrigger"));
    write_file(&project.join("src/main.cc"), HELLO_MAIN);

    assert!(run_cabin(&["build"], project).status.success());

    // A touched source makes the plan stale again.
    std::thread::sleep(std::time::Duration::from_millis(1100));
    write_file(
        &project.join("src/main.cc"),
        &HELLO_MAIN.replace("Hello, world!", "Hello, again!"),
    );

    let output = run_cabin(&["build"], project);
    let stderr = stderr_of(&output);
    assert!(output.status.success(), "{stderr}");
    assert!(stderr.contains("Compiling retrigger v0.1.0"), "{stderr}");

    let run = std::process::Command::new(project.join("cabin-out/dev/retrigger"))
        .output()
        .expect("failed to run built binary");
    assert_eq!(String::from_utf8_lossy(&run.stdout), "Hello, again!\n");
}

#[test]
fn compdb_mode_generates_without_building() {
    if !have_build_tools() {
        eprintln!("skipping: build tools not available");
        return;
    }

    let tmp = TempDir::new("compdb");
    let project = &tmp.path;
    write_file(&project.join("cabin.toml"), &manifest("compdb_project"));
    write_file(&project.join("src/main.cc"), HELLO_MAIN);

    let output = run_cabin(&["build", "--compdb"], project);
    let stderr = stderr_of(&output);
    assert!(output.status.success(), "{stderr}");
    assert!(stderr.contains("Generated"), "{stderr}");
    assert!(stderr.contains("compile_commands.json"), "{stderr}");

    let compdb = project.join("cabin-out/compile_commands.json");
    assert!(compdb.is_file());
    let entries: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&compdb).unwrap()).unwrap();
    let entries = entries.as_array().expect("compdb must be a JSON array");
    assert_eq!(entries.len(), 1);
    assert!(
        entries[0]["file"]
            .as_str()
            .is_some_and(|file| file.ends_with("main.cc"))
    );

    // The plan exists, the binary was not linked.
    assert!(project.join("cabin-out/dev/build.ninja").is_file());
    assert!(!project.join("cabin-out/dev/compdb_project").exists());
}

#[test]
fn run_builds_and_executes_the_binary() {
    if !have_build_tools() {
        eprintln!("skipping: build tools not available");
        return;
    }

    let tmp = TempDir::new("run");
    let project = &tmp.path;
    write_file(&project.join("cabin.toml"), &manifest("runner"));
    write_file(&project.join("src/main.cc"), HELLO_MAIN);

    let output = run_cabin(&["run"], project);
    let stderr = stderr_of(&output);
    assert!(output.status.success(), "{stderr}");
    assert_eq!(stdout_of(&output), "Hello, world!\n");
    assert!(stderr.contains("Running `cabin-out/dev/runner`"), "{stderr}");
}

#[test]
fn missing_manifest_is_an_error() {
    let tmp = TempDir::new("no_manifest");
    let output = run_cabin(&["build"], &tmp.path);
    assert!(!output.status.success());
    let stderr = stderr_of(&output);
    assert!(stderr.contains("Error:"), "{stderr}");
    assert!(stderr.contains("could not find `cabin.toml`"), "{stderr}");
}

#[test]
fn invalid_edition_is_an_error() {
    let tmp = TempDir::new("bad_edition");
    let project = &tmp.path;
    write_file(
        &project.join("cabin.toml"),
        "[package]\nname = \"bad\"\nversion = \"0.1.0\"\nedition = \"99\"\n",
    );
    write_file(&project.join("src/main.cc"), HELLO_MAIN);

    let output = run_cabin(&["build"], project);
    assert!(!output.status.success());
    assert!(stderr_of(&output).contains("invalid edition"));
}

#[test]
fn multiple_main_sources_are_an_error() {
    let tmp = TempDir::new("two_mains");
    let project = &tmp.path;
    write_file(&project.join("cabin.toml"), &manifest("two_mains"));
    write_file(&project.join("src/main.cc"), HELLO_MAIN);
    write_file(&project.join("src/main.cpp"), HELLO_MAIN);

    // The error surfaces before any compiler invocation, so a plain CXX
    // value is enough even without a toolchain installed.
    let output = run_cabin_env(&["build"], project, &[("CXX", "c++")]);
    assert!(!output.status.success());
    assert!(stderr_of(&output).contains("multiple main sources were found"));
}

#[test]
fn project_without_any_target_is_an_error() {
    let tmp = TempDir::new("no_target");
    let project = &tmp.path;
    write_file(&project.join("cabin.toml"), &manifest("no_target"));
    write_file(&project.join("src/util.cc"), "int util() { return 1; }\n");

    let output = run_cabin_env(&["build"], project, &[("CXX", "c++")]);
    assert!(!output.status.success());
    assert!(stderr_of(&output).contains("expected either"));
}

#[test]
fn clean_removes_the_out_tree() {
    if !have_build_tools() {
        eprintln!("skipping: build tools not available");
        return;
    }

    let tmp = TempDir::new("clean");
    let project = &tmp.path;
    write_file(&project.join("cabin.toml"), &manifest("clean_me"));
    write_file(&project.join("src/main.cc"), HELLO_MAIN);

    assert!(run_cabin(&["build"], project).status.success());
    assert!(project.join("cabin-out").exists());

    let output = run_cabin(&["clean"], project);
    assert!(output.status.success(), "{}", stderr_of(&output));
    assert!(!project.join("cabin-out").exists());
}
