use super::*;

#[test]
fn skips_comments_and_blank_lines() {
    let src = "# my pad\n\nname Left Pad\n  key1.rt 1  \nkey.lh 120\r\n# end\ndkey1.char c\nsave\n";

    let lines = parse_script(src).unwrap();

    assert_eq!(
        lines,
        vec!["name Left Pad", "key1.rt 1", "key.lh 120", "dkey1.char c", "save"]
    );
}

#[test]
fn reports_first_bad_line() {
    let src = "key1.rt 1\n\nkey1.lh high\nfoo\n";

    let err = parse_script(src).unwrap_err();

    assert_eq!(err.line, Some(3));
    assert_eq!(err.message, "invalid value: key1.lh high");
}

#[test]
fn refuses_boot_and_unknown_lines() {
    assert_eq!(
        check_line("boot"),
        Err("boot is not allowed in a settings script".into())
    );
    assert_eq!(
        check_line("key1.speed 3"),
        Err("unknown setting: key1.speed 3".into())
    );
    assert_eq!(check_line("key0.rt 1"), Err("invalid key index: key0.rt 1".into()));
    assert_eq!(check_line("reset"), Err("unknown command: reset".into()));
}

#[test]
fn refuses_long_lines() {
    let line = format!("name {}", "n".repeat(MAX_LINE_LEN));

    assert_eq!(check_line(&line), Err(format!("line longer than {MAX_LINE_LEN} bytes")));
}
