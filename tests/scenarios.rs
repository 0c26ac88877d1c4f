// End-to-end scenarios: whole lines in, console text out.

use std::sync::Arc;

use cellforth::{run_events, Event, EventQueue, ForthError, ForthRuntime, QueueMode, SharedBuffer};
use proptest::prelude::*;

fn forth() -> (ForthRuntime, SharedBuffer) {
    let out = SharedBuffer::new();
    let f = ForthRuntime::boot(Box::new(out.clone())).unwrap();
    (f, out)
}

fn stack(f: &ForthRuntime) -> Vec<i32> {
    f.kernel.data_stack().iter_from_bottom().copied().collect()
}

#[test]
fn square() {
    let (mut f, out) = forth();
    f.interpret_line(": SQUARE DUP * ;").unwrap();
    f.interpret_line("5 SQUARE").unwrap();
    assert_eq!(stack(&f), vec![25]);
    f.interpret_line(".").unwrap();
    assert_eq!(out.take(), " ok\n ok\n25  ok\n");
}

#[test]
fn countdown() {
    let (mut f, out) = forth();
    f.interpret_line(": COUNTDOWN 5 0 DO I NEGATE . LOOP ;").unwrap();
    out.take();
    f.interpret_line("COUNTDOWN").unwrap();
    assert_eq!(out.take(), "0 -1 -2 -3 -4  ok\n");
}

#[test]
fn unknown_word_leaves_depth_alone() {
    let (mut f, out) = forth();
    f.interpret_line("1 2 3").unwrap();
    out.take();
    let err = f.interpret_line("FOOBAR 4").unwrap_err();
    assert!(matches!(err, ForthError::UnknownWord(ref w) if w == "FOOBAR"));
    assert_eq!(out.take(), " FOOBAR ?\n");
    assert_eq!(stack(&f), vec![1, 2, 3]);
}

#[test]
fn unknown_word_in_definition_discards_it() {
    let (mut f, _) = forth();
    let here = f.here().unwrap();
    assert!(f.interpret_line(": broken 1 nosuch ;").is_err());
    assert!(!f.is_compiling());
    assert_eq!(f.here().unwrap(), here);
    assert!(f.interpret_line("broken").is_err());
}

#[test]
fn overlong_name_defines_nothing() {
    let (mut f, out) = forth();
    let here = f.here().unwrap();
    let long = "x".repeat(64);
    f.interpret_line(&format!("1 constant {} 7", long)).unwrap();
    assert_eq!(out.take(), " ok\n");
    assert_eq!(stack(&f), vec![7]);
    assert_eq!(f.here().unwrap(), here);
    f.interpret_line(&format!("variable {} create {}", long, long)).unwrap();
    assert_eq!(f.here().unwrap(), here);
    assert!(f.interpret_line(&long).is_err());
}

#[test]
fn non_ascii_names_are_found() {
    let (mut f, out) = forth();
    f.interpret_line(": café 7 ;").unwrap();
    f.interpret_line("café ' café execute").unwrap();
    assert_eq!(stack(&f), vec![7, 7]);
    out.take();
    assert!(f.interpret_line("thé").is_err());
    assert_eq!(out.take(), " thé ?\n");
}

#[test]
fn invalid_token_only_aborts_that_execute() {
    let (mut f, out) = forth();
    f.interpret_line("1 0 EXECUTE 2").unwrap();
    assert_eq!(out.take(), " Invalid execution token 0x0\n ok\n");
    assert_eq!(stack(&f), vec![1, 2]);
}

#[test]
fn unbalanced_definition_is_rolled_back() {
    let (mut f, out) = forth();
    f.interpret_line(": ok-word 1 ;").unwrap();
    out.take();
    assert!(matches!(
        f.interpret_line(": bad if 1 ;"),
        Err(ForthError::UnbalancedControl)
    ));
    assert_eq!(out.take(), " Unbalanced control structure\n");
    f.interpret_line("ok-word").unwrap();
    assert_eq!(stack(&f), vec![1]);
    assert!(f.find_word(b"bad").unwrap().is_none());
}

#[test]
fn underflow_resets_and_recovers() {
    let (mut f, out) = forth();
    f.interpret_line("1 2").unwrap();
    out.take();
    assert!(f.interpret_line("+ + +").is_err());
    assert_eq!(out.take(), " Data stack underflow\n");
    assert!(stack(&f).is_empty());
    f.interpret_line("7 .").unwrap();
    assert_eq!(out.take(), "7  ok\n");
}

#[test]
fn nested_loops_with_leave() {
    let (mut f, out) = forth();
    f.interpret_line(": grid 3 0 DO 10 0 DO I J + . I 1 = IF LEAVE THEN LOOP LOOP ;").unwrap();
    out.take();
    f.interpret_line("grid").unwrap();
    assert_eq!(out.take(), "0 1 1 2 2 3  ok\n");
}

#[test]
fn begin_while_repeat_and_plus_loop() {
    let (mut f, out) = forth();
    f.interpret_line(": halve BEGIN DUP 1 > WHILE 2/ DUP . REPEAT DROP ;").unwrap();
    f.interpret_line(": evens 10 0 DO I . 2 +LOOP ;").unwrap();
    f.interpret_line(": down 0 10 DO I . -3 +LOOP ;").unwrap();
    out.take();
    f.interpret_line("20 halve evens down").unwrap();
    assert_eq!(out.take(), "10 5 2 1 0 2 4 6 8 10 7 4 1  ok\n");
}

#[test]
fn question_do_skips_empty_range() {
    let (mut f, out) = forth();
    f.interpret_line(": each ?DO I . LOOP ;").unwrap();
    out.take();
    f.interpret_line("3 3 each 3 1 each").unwrap();
    assert_eq!(out.take(), "1 2  ok\n");
}

#[test]
fn doubles_and_mixed_arithmetic() {
    let (mut f, out) = forth();
    f.interpret_line("1000000. 2000000. D+ D.").unwrap();
    f.interpret_line("-7 2 FM/MOD . . -7. 2 SM/REM . .").unwrap();
    assert_eq!(out.take(), "3000000  ok\n-4 1 -3 -1  ok\n");
}

#[test]
fn evaluate_and_strings() {
    let (mut f, out) = forth();
    f.interpret_line(": greet .\" hello\" ;").unwrap();
    f.interpret_line("S\" greet 1 2 +\" EVALUATE .").unwrap();
    assert_eq!(out.take(), " ok\nhello3  ok\n");
}

#[test]
fn see_round_trips_a_definition() {
    let (mut f, out) = forth();
    f.interpret_line(": sq dup * ;").unwrap();
    out.take();
    f.interpret_line("see sq").unwrap();
    assert_eq!(out.take(), ": sq DUP * ; ok\n");
}

#[test]
fn events_run_in_priority_order() {
    let (mut f, out) = forth();
    let queue = Arc::new(EventQueue::new());
    f.attach_queue(queue.clone());
    f.interpret_line(": port-handler . ;").unwrap();
    f.interpret_line("9 0 LISTEN port-handler").unwrap();
    assert_eq!(queue.port_mode(9), QueueMode::Always);
    out.take();

    queue.push_line("1 .".to_string());
    queue.port_event(9, 77);
    queue.push_line("BYE".to_string());
    queue.push_line("2 .".to_string());

    let mut lines = 0;
    run_events(&mut f, &queue, |_| lines += 1);
    assert_eq!(out.take(), "77 1  ok\n ok\n");
    assert_eq!(lines, 2);
    assert!(queue.is_closed());
    assert_eq!(queue.try_next(), Some(Event::Line("2 .".to_string())));
}

proptest! {
    #[test]
    fn literal_compiles_to_same_value(n in any::<i32>()) {
        let (mut f, _) = forth();
        f.interpret_line(&format!("{}", n)).unwrap();
        f.interpret_line(&format!(": lit {} ;", n)).unwrap();
        f.interpret_line("lit").unwrap();
        prop_assert_eq!(stack(&f), vec![n, n]);
    }

    #[test]
    fn exactly_one_branch_runs(flag in any::<i32>()) {
        let (mut f, _) = forth();
        f.interpret_line("VARIABLE a VARIABLE b").unwrap();
        f.interpret_line(": choose IF 1 a +! ELSE 1 b +! THEN ;").unwrap();
        f.interpret_line(&format!("{} choose a @ b @", flag)).unwrap();
        let expected = if flag != 0 { vec![1, 0] } else { vec![0, 1] };
        prop_assert_eq!(stack(&f), expected);
    }

    #[test]
    fn do_loop_runs_limit_minus_start_times(start in -50i32..50, span in 1i32..60) {
        let (mut f, _) = forth();
        f.interpret_line("VARIABLE n").unwrap();
        f.interpret_line(": count-up DO 1 n +! LOOP ;").unwrap();
        f.interpret_line(&format!("{} {} count-up n @", start + span, start)).unwrap();
        prop_assert_eq!(stack(&f), vec![span]);
    }
}
