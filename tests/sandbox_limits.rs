//! Timeouts, resource ceilings and isolation between executions.

use jsbox::pipeline::{Pipeline, PipelineConfig};
use jsbox::sandbox::{ExecutionLimits, ExecutionState, RESOURCE_LIMIT_MESSAGE, SandboxExecutor};
use jsbox::syntax::parse_program;
use std::thread;
use std::time::{Duration, Instant};

const SHORT: Duration = Duration::from_millis(300);
const SLACK: Duration = Duration::from_secs(2);

fn short_limits() -> ExecutionLimits {
    ExecutionLimits::with_timeout(SHORT)
}

fn execute(source: &str, limits: &ExecutionLimits) -> jsbox::sandbox::ExecutionResult {
    let program = parse_program(source).unwrap();
    SandboxExecutor::new().execute(&program, limits)
}

#[test]
fn infinite_loop_times_out_promptly() {
    let started = Instant::now();
    let result = execute("while (true) {}", &short_limits());
    assert!(started.elapsed() < SHORT + SLACK);
    assert!(!result.success);
    assert_eq!(result.state, ExecutionState::TimedOut);
    assert!(result.error.unwrap().contains("timed out"));
}

#[test]
fn output_before_a_timeout_is_kept() {
    let result = execute("print('before'); console.log('still'); for (;;) {}", &short_limits());
    assert!(!result.success);
    assert_eq!(result.logs, ["before", "still"]);
}

#[test]
fn finally_cannot_swallow_the_interrupt() {
    let result = execute(
        "try { while (true) {} } catch (e) { print('caught'); } finally { print('finally'); while (true) {} }",
        &short_limits(),
    );
    assert_eq!(result.state, ExecutionState::TimedOut);
    assert!(result.logs.is_empty(), "{:?}", result.logs);
}

#[test]
fn recursion_without_a_base_case_is_catchable() {
    let result = execute(
        "function down(n) { return down(n + 1) + 1; }
         try { down(0); } catch (e) { print(e instanceof RangeError); }",
        &ExecutionLimits::default(),
    );
    assert!(result.success);
    assert_eq!(result.logs, ["true"]);
}

#[test]
fn allocation_bombs_hit_the_heap_ceiling() {
    let limits = ExecutionLimits {
        max_heap_objects: 20_000,
        ..short_limits()
    };
    let result = execute("const keep = []; for (;;) keep.push([1, 2, 3]);", &limits);
    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some(RESOURCE_LIMIT_MESSAGE));
    assert_eq!(result.state, ExecutionState::Faulted);
}

#[test]
fn output_floods_are_capped() {
    let limits = ExecutionLimits {
        max_output_lines: 50,
        ..short_limits()
    };
    let result = execute("for (let i = 0; ; i++) print(i);", &limits);
    assert!(!result.success);
    assert_eq!(result.logs.len(), 50);
    assert_eq!(result.logs[49], "49");
}

#[test]
fn concurrent_runs_do_not_share_globals() {
    let pipeline = Pipeline::new(PipelineConfig::default());
    let (polluter, observer) = thread::scope(|scope| {
        let polluter = scope.spawn(|| {
            pipeline.submit(
                "var leaked = 'yes'; Array.prototype.extra = 1; Object.prototype.shared = 2;
                 Math.max = () => 0; print(typeof leaked, [].extra);",
            )
        });
        let observer = scope.spawn(|| {
            pipeline.submit("print(typeof leaked, [].extra, ({}).shared, Math.max(1, 2));")
        });
        (polluter.join().unwrap(), observer.join().unwrap())
    });
    assert_eq!(polluter.report().unwrap().logs, ["string 1"]);
    assert_eq!(observer.report().unwrap().logs, ["undefined undefined undefined 2"]);

    let later = pipeline.submit("print(typeof leaked, [].extra);");
    assert_eq!(later.report().unwrap().logs, ["undefined undefined"]);
}

#[test]
fn many_runs_in_parallel_all_finish() {
    let pipeline = Pipeline::default();
    let outputs: Vec<_> = thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|index| {
                let pipeline = &pipeline;
                scope.spawn(move || pipeline.submit(&format!("print({index} * 2);")))
            })
            .collect();
        handles.into_iter().map(|handle| handle.join().unwrap()).collect()
    });
    for (index, response) in outputs.iter().enumerate() {
        assert_eq!(response.report().unwrap().logs, [(index * 2).to_string()]);
    }
}

#[test]
fn long_running_builtins_observe_the_timeout() {
    let workloads = [
        "const a = new Array(1 << 20).fill(7); a.sort(); print('sorted');",
        "const a = new Array(1 << 20).fill(0).map((_, i) => i); a.sort(); print('sorted');",
        "const s = 'a'.repeat(1 << 24); print(s.indexOf('a'.repeat(1 << 13) + 'b'));",
    ];
    for source in workloads {
        let started = Instant::now();
        let result = execute(source, &short_limits());
        let elapsed = started.elapsed();
        assert!(elapsed < SHORT + SLACK, "{source}: took {elapsed:?}");
        assert_eq!(result.state, ExecutionState::TimedOut, "{source}");
        assert!(result.logs.is_empty(), "{source}: {:?}", result.logs);
    }
}

#[test]
fn closures_capturing_loop_scopes_are_reclaimed() {
    let limits = ExecutionLimits {
        max_heap_objects: 10_000,
        ..ExecutionLimits::with_timeout(Duration::from_secs(60))
    };
    let result = execute(
        "const keep = [];
         let n = 0;
         for (let i = 0; i < 100000; i++) {
           const f = () => i;
           n += f();
           if (i % 10000 === 0) keep.push(f);
         }
         print(n, keep.length, keep[3]());",
        &limits,
    );
    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.logs, ["4999950000 10 30000"]);
}
