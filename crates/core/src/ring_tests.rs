// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use super::*;

#[test]
fn empty_buffer_has_no_lines() {
    let ring = RingBuffer::new(16);
    assert_eq!(ring.all(), Vec::<String>::new());
    assert_eq!(ring.count(), 0);
    assert_eq!(ring.total_appended(), 0);
}

#[test]
fn partial_writes_coalesce_into_one_line() {
    let mut ring = RingBuffer::new(16);
    ring.append_data("abc");
    ring.append_data("def\n");
    assert_eq!(ring.all(), vec!["abcdef".to_string()]);
    assert_eq!(ring.total_appended(), 1);
}

#[test]
fn leading_newline_closes_prior_open_line() {
    let mut ring = RingBuffer::new(16);
    ring.append_data("xyz");
    ring.append_data("\nabc");
    assert_eq!(ring.all(), vec!["xyz".to_string(), "abc".to_string()]);
}

#[test]
fn leading_newline_on_empty_open_line_yields_blank_line() {
    let mut ring = RingBuffer::new(16);
    ring.append_data("\nabc");
    assert_eq!(ring.all(), vec![String::new(), "abc".to_string()]);
}

#[test]
fn multiple_embedded_newlines_split_into_several_lines() {
    let mut ring = RingBuffer::new(16);
    ring.append_data("one\ntwo\nthree");
    assert_eq!(ring.all(), vec!["one".to_string(), "two".to_string(), "three".to_string()]);
}

#[test]
fn ansi_escape_bytes_pass_through_a_line_unmodified() {
    let mut ring = RingBuffer::new(16);
    let line = "\x1b[31mred\x1b[0m\n";
    ring.append_data(line);
    assert_eq!(ring.all(), vec!["\x1b[31mred\x1b[0m".to_string()]);
}

#[test]
fn overwrite_at_capacity_drops_oldest_completed_line() {
    let mut ring = RingBuffer::new(2);
    ring.push("a");
    ring.push("b");
    ring.push("c");
    assert_eq!(ring.all(), vec!["b".to_string(), "c".to_string()]);
    assert_eq!(ring.count(), 2);
    assert_eq!(ring.total_appended(), 3);
}

#[test]
fn last_n_returns_most_recent_visible_lines() {
    let mut ring = RingBuffer::new(16);
    ring.push("a");
    ring.push("b");
    ring.push("c");
    assert_eq!(ring.last(2), vec!["b".to_string(), "c".to_string()]);
    assert_eq!(ring.last(100), vec!["a".to_string(), "b".to_string(), "c".to_string()]);
}

#[test]
fn clear_resets_count_and_lines() {
    let mut ring = RingBuffer::new(16);
    ring.push("a");
    ring.append_data("open");
    ring.clear();
    assert_eq!(ring.count(), 0);
    assert_eq!(ring.all(), Vec::<String>::new());
    assert_eq!(ring.total_appended(), 0);
}

#[test]
fn is_fresh_false_before_any_write() {
    let ring = RingBuffer::new(16);
    assert!(!ring.is_fresh(Duration::from_secs(60)));
}

#[test]
fn is_fresh_true_immediately_after_write() {
    let mut ring = RingBuffer::new(16);
    ring.push("a");
    assert!(ring.is_fresh(Duration::from_secs(60)));
}

#[test]
fn capacity_floor_is_one() {
    let ring = RingBuffer::new(0);
    assert_eq!(ring.capacity(), 1);
}
