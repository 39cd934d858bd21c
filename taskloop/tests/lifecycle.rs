//! End-to-end lifecycle tests over scripted completion clients.
//!
//! These drive the full plan/execute/check/interpret/fix machine with a
//! real workspace directory and a real (sh) interpreter for Run File, but
//! no network: every model response is scripted.

use taskloop::core::task::Task;
use taskloop::execute::ExecutionContext;
use taskloop::io::config::RunConfig;
use taskloop::io::prompt::PromptEngine;
use taskloop::run::{Phase, RunEvent, RunStop, run_objective};
use taskloop::test_support::{ScriptedClient, TestWorkspace};

fn sh_run_config() -> RunConfig {
    RunConfig {
        command: vec!["sh".to_string()],
        timeout_secs: 5,
        output_limit_bytes: 10_000,
    }
}

/// A run that writes a script, verifies it by executing and re-reading it,
/// and terminates on the first yes judgment.
#[test]
fn write_run_read_cycle_confirms_objective() {
    let fixture = TestWorkspace::new();
    let workspace = fixture.workspace();
    let client = ScriptedClient::new([
        // plan
        "#@ 1. Write File: hello.py write a script that prints ok",
        // code content, wrapped in prose and a fence the handler must strip
        "Sure, here is the script:\n```sh\necho ok\n```\nThat should do it.",
        // verification plan: run it, then inspect the source
        "#@ 1. Run File: hello.py execute the script\n#@ 2. Read File: hello.py inspect the source",
        // judgment
        "#@ Yes: the script prints ok",
    ]);
    let prompts = PromptEngine::new();
    let run = sh_run_config();
    let ctx = ExecutionContext {
        client: &client,
        workspace: &workspace,
        prompts: &prompts,
        run: &run,
    };

    let mut planned: Vec<(Phase, usize)> = Vec::new();
    let mut executed: Vec<Task> = Vec::new();
    let outcome = run_objective(
        &ctx,
        "create a script that prints ok and verify it",
        3,
        |event| match event {
            RunEvent::Planned { phase, tasks } => planned.push((phase, tasks.len())),
            RunEvent::Executed { task, .. } => executed.push(task.clone()),
            RunEvent::Judged { .. } => {}
        },
    )
    .expect("run");

    assert_eq!(outcome.stop, RunStop::Achieved);
    assert_eq!(outcome.fix_cycles, 0);
    assert_eq!(planned, vec![(Phase::Plan, 1), (Phase::Check, 2)]);
    assert_eq!(executed.len(), 3);

    // Only the fenced block landed in the file.
    assert_eq!(
        workspace.read_file("hello.py").expect("read"),
        Some("echo ok\n".to_string())
    );

    // The judgment prompt saw both the script output and the source text.
    let prompt_log = client.prompts();
    let judgment_prompt = prompt_log.last().expect("judgment prompt");
    assert!(judgment_prompt.contains(" the output of hello.py is: ok\n. "));
    assert!(judgment_prompt.contains("this is what's written inside the hello.py file: echo ok"));
    assert_eq!(client.remaining(), 0);
}

/// A failed judgment triggers a fix cycle whose write repairs the
/// workspace; the second check then confirms the objective.
#[test]
fn fix_cycle_repairs_and_confirms() {
    let fixture = TestWorkspace::new();
    let workspace = fixture.workspace();
    let client = ScriptedClient::new([
        // plan forgets to write the file
        "#@ 1. Research: a.txt what should a.txt contain",
        // research answer
        "it should contain hello",
        // verification plan
        "#@ 1. Read File: a.txt confirm the contents",
        // judgment: failure (a.txt missing)
        "#@ No: a.txt does not exist",
        // fix plan
        "#@ 1. Write File: a.txt write the word hello",
        // content for a.txt
        "hello",
        // verification plan for the fix list
        "#@ 1. Read File: a.txt confirm the contents",
        // judgment: success
        "#@ Yes: a.txt now contains hello",
    ]);
    let prompts = PromptEngine::new();
    let run = sh_run_config();
    let ctx = ExecutionContext {
        client: &client,
        workspace: &workspace,
        prompts: &prompts,
        run: &run,
    };

    let mut phases = Vec::new();
    let outcome = run_objective(&ctx, "create a.txt with text hello", 3, |event| {
        if let RunEvent::Planned { phase, .. } = event {
            phases.push(phase);
        }
    })
    .expect("run");

    assert_eq!(outcome.stop, RunStop::Achieved);
    assert_eq!(outcome.fix_cycles, 1);
    assert_eq!(
        phases,
        vec![Phase::Plan, Phase::Check, Phase::Fix, Phase::Check]
    );
    assert_eq!(
        workspace.read_file("a.txt").expect("read"),
        Some("hello".to_string())
    );

    // The first check fed the missing-file fact to the first judgment.
    let prompt_log = client.prompts();
    assert!(prompt_log[3].contains("a.txt does not exist"));
    // The fix prompt carried the failure reasoning.
    assert!(prompt_log[4].contains("#@ No: a.txt does not exist"));
}

/// Malformed segments and unknown actions are dropped without derailing
/// the rest of the run.
#[test]
fn malformed_tasks_do_not_derail_the_run() {
    let fixture = TestWorkspace::new();
    let workspace = fixture.workspace();
    let client = ScriptedClient::new([
        // plan: one unparseable segment, one unknown action, one good task
        "#@ . empty\n#@ 1. Delete File: junk.txt remove it\n#@ 2. Write File: a.txt write the word hello",
        // content for a.txt
        "hello",
        // verification plan
        "#@ 1. Read File: a.txt confirm",
        // judgment
        "#@ Yes: done",
    ]);
    let prompts = PromptEngine::new();
    let run = sh_run_config();
    let ctx = ExecutionContext {
        client: &client,
        workspace: &workspace,
        prompts: &prompts,
        run: &run,
    };

    let mut plan_task_count = None;
    let outcome = run_objective(&ctx, "create a.txt with text hello", 3, |event| {
        if let RunEvent::Planned {
            phase: Phase::Plan,
            tasks,
        } = event
        {
            plan_task_count = Some(tasks.len());
        }
    })
    .expect("run");

    // The segment with no ordinal was dropped at parse time; the unknown
    // action parsed but was skipped at dispatch.
    assert_eq!(plan_task_count, Some(2));
    assert_eq!(outcome.stop, RunStop::Achieved);
    assert_eq!(
        workspace.read_file("a.txt").expect("read"),
        Some("hello".to_string())
    );
}
