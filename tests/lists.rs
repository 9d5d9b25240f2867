//! `v-for` sections: structural array changes, access-path realignment,
//! nested repetitions.
//!
//! Run with: cargo test --test lists

mod common;

use serde_json::json;
use spark_vm::{Path, Value, Warning};

use common::mount;

// =============================================================================
// STRUCTURAL CHANGES
// =============================================================================

#[test]
fn test_expands_one_clone_per_element() {
    let (vm, root) = mount(
        r#"<ul><li v-for="item in items">{{ item.name }}</li></ul>"#,
        json!({"items": [{"name": "a"}, {"name": "b"}]}),
    );
    assert_eq!(vm.inner_html(root), "<li>a</li><li>b</li>");
}

#[test]
fn test_push_and_pop() {
    let (vm, root) = mount(
        r#"<ul><li v-for="item in items">{{ item.name }}</li></ul>"#,
        json!({"items": [{"name": "a"}]}),
    );

    assert_eq!(vm.push("items", json!({"name": "b"})), Some(2));
    assert_eq!(vm.inner_html(root), "<li>a</li><li>b</li>");

    assert_eq!(vm.pop("items"), Some(json!({"name": "b"})));
    assert_eq!(vm.inner_html(root), "<li>a</li>");

    vm.pop("items");
    assert_eq!(vm.inner_html(root), "");
    assert_eq!(vm.pop("items"), None);
}

#[test]
fn test_unshift_realigns_existing_clones() {
    let (vm, root) = mount(
        r#"<ul><li v-for="item in items">{{ item.name }}</li></ul>"#,
        json!({"items": [{"name": "a"}, {"name": "b"}]}),
    );

    vm.unshift("items", json!({"name": "z"}));
    assert_eq!(vm.inner_html(root), "<li>z</li><li>a</li><li>b</li>");

    // The clone built for index 0 now answers to index 1
    vm.set("items.1.name", "A");
    assert_eq!(vm.inner_html(root), "<li>z</li><li>A</li><li>b</li>");

    vm.set("items.0.name", "Z");
    assert_eq!(vm.inner_html(root), "<li>Z</li><li>A</li><li>b</li>");
}

#[test]
fn test_shift_realigns_remaining_clones() {
    let (vm, root) = mount(
        r#"<ul><li v-for="item in items">{{ item.name }}</li></ul>"#,
        json!({"items": [{"name": "a"}, {"name": "b"}, {"name": "c"}]}),
    );
    let before = vm.subscription_count();

    assert_eq!(vm.shift("items"), Some(json!({"name": "a"})));
    assert_eq!(vm.inner_html(root), "<li>b</li><li>c</li>");
    assert_eq!(vm.subscription_count(), before - 1);

    vm.set("items.0.name", "B");
    vm.set("items.1.name", "C");
    assert_eq!(vm.inner_html(root), "<li>B</li><li>C</li>");
}

#[test]
fn test_static_siblings_survive() {
    let (vm, root) = mount(
        r#"<ul><li>head</li><li v-for="item in items">{{ item }}</li><li>tail</li></ul>"#,
        json!({"items": ["a"]}),
    );
    assert_eq!(vm.inner_html(root), "<li>head</li><li>a</li><li>tail</li>");

    vm.push("items", "b");
    vm.unshift("items", "z");
    assert_eq!(
        vm.inner_html(root),
        "<li>head</li><li>z</li><li>a</li><li>b</li><li>tail</li>"
    );

    vm.set("items", json!(["x"]));
    assert_eq!(vm.inner_html(root), "<li>head</li><li>x</li><li>tail</li>");
}

#[test]
fn test_reorders_rebuild() {
    let (vm, root) = mount(
        r#"<ul><li v-for="n in nums">{{ n }}</li></ul>"#,
        json!({"nums": [3, 1, 2]}),
    );

    vm.sort_by("nums", |a, b| a.as_i64().cmp(&b.as_i64()));
    assert_eq!(vm.inner_html(root), "<li>1</li><li>2</li><li>3</li>");

    vm.reverse("nums");
    assert_eq!(vm.inner_html(root), "<li>3</li><li>2</li><li>1</li>");

    let removed = vm.splice("nums", 1, 1, vec![json!(7), json!(8)]);
    assert_eq!(removed, Some(vec![json!(2)]));
    assert_eq!(
        vm.inner_html(root),
        "<li>3</li><li>7</li><li>8</li><li>1</li>"
    );
}

#[test]
fn test_index_literal() {
    let (vm, root) = mount(
        r#"<ul><li v-for="item in items"><b v-text="$index"></b>{{ item }}</li></ul>"#,
        json!({"items": ["a", "b"]}),
    );
    assert_eq!(
        vm.inner_html(root),
        "<li><b>0</b>a</li><li><b>1</b>b</li>"
    );
}

#[test]
fn test_index_follows_unshift_and_shift() {
    let (vm, root) = mount(
        r#"<ul><li v-for="item in items" v-bind:id="row-$index"><b>{{ $index }}</b>{{ item }}</li></ul>"#,
        json!({"items": ["a", "b"]}),
    );

    vm.unshift("items", "z");
    assert_eq!(
        vm.inner_html(root),
        r#"<li id="row-0"><b>0</b>z</li><li id="row-1"><b>1</b>a</li><li id="row-2"><b>2</b>b</li>"#
    );

    vm.shift("items");
    vm.shift("items");
    assert_eq!(vm.inner_html(root), r#"<li id="row-0"><b>0</b>b</li>"#);
}

#[test]
fn test_globals_inside_clones() {
    let (vm, root) = mount(
        r#"<ul><li v-for="item in items">{{ item }}<i>{{ suffix }}</i></li></ul>"#,
        json!({"items": ["a", "b"], "suffix": "!"}),
    );
    vm.set("suffix", "?");
    assert_eq!(
        vm.inner_html(root),
        "<li>a<i>?</i></li><li>b<i>?</i></li>"
    );
}

// =============================================================================
// NESTING
// =============================================================================

#[test]
fn test_nested_sections_follow_outer_realignment() {
    let (vm, root) = mount(
        r#"<div><p v-for="row in rows"><span v-for="cell in row.cells">{{ cell }}</span></p></div>"#,
        json!({"rows": [{"cells": [1, 2]}]}),
    );
    assert_eq!(vm.inner_html(root), "<p><span>1</span><span>2</span></p>");

    vm.push("rows.0.cells", 3);
    assert_eq!(
        vm.inner_html(root),
        "<p><span>1</span><span>2</span><span>3</span></p>"
    );

    vm.unshift("rows", json!({"cells": [9]}));
    assert_eq!(
        vm.inner_html(root),
        "<p><span>9</span></p><p><span>1</span><span>2</span><span>3</span></p>"
    );

    vm.push("rows.1.cells", 4);
    vm.set("rows.0.cells.0", 8);
    assert_eq!(
        vm.inner_html(root),
        "<p><span>8</span></p><p><span>1</span><span>2</span><span>3</span><span>4</span></p>"
    );
}

#[test]
fn test_if_inside_list_recompiles_after_unshift() {
    let (vm, root) = mount(
        r#"<ul><li v-for="item in items"><b v-if="item.on">{{ item.name }}</b></li></ul>"#,
        json!({"items": [{"on": true, "name": "a"}]}),
    );

    vm.unshift("items", json!({"on": true, "name": "z"}));
    vm.set("items.1.on", false);
    assert_eq!(vm.inner_html(root), "<li><b>z</b></li><li><b></b></li>");

    vm.set("items.1.on", true);
    vm.set("items.1.name", "A");
    assert_eq!(vm.inner_html(root), "<li><b>z</b></li><li><b>A</b></li>");
}

#[test]
fn test_if_inside_list_recompiles_after_shift() {
    let (vm, root) = mount(
        r#"<ul><li v-for="item in items"><b v-if="item.on">{{ item.name }}</b></li></ul>"#,
        json!({"items": [{"on": true, "name": "a"}, {"on": true, "name": "b"}]}),
    );

    vm.shift("items");
    vm.set("items.0.on", false);
    vm.set("items.0.on", true);
    assert_eq!(vm.inner_html(root), "<li><b>b</b></li>");

    vm.set("items.0.name", "B");
    assert_eq!(vm.inner_html(root), "<li><b>B</b></li>");
}

#[test]
fn test_list_under_if_inside_list_follows_realignment() {
    let (vm, root) = mount(
        r#"<div><p v-for="row in rows"><span v-if="row.open"><i v-for="cell in row.cells">{{ cell }}</i></span></p></div>"#,
        json!({"rows": [{"open": true, "cells": [1]}]}),
    );

    vm.unshift("rows", json!({"open": true, "cells": [9]}));
    vm.set("rows.1.open", false);
    vm.set("rows.1.open", true);
    vm.push("rows.1.cells", 2);
    assert_eq!(
        vm.inner_html(root),
        "<p><span><i>9</i></span></p><p><span><i>1</i><i>2</i></span></p>"
    );
}

#[test]
fn test_list_inside_if_is_released_with_it() {
    let (vm, root) = mount(
        r#"<div><ul v-if="open"><li v-for="item in items">{{ item }}</li></ul></div>"#,
        json!({"open": true, "items": ["a", "b"]}),
    );
    assert_eq!(vm.inner_html(root), "<ul><li>a</li><li>b</li></ul>");

    vm.set("open", false);
    assert_eq!(vm.inner_html(root), "<ul></ul>");
    assert_eq!(vm.subscription_count(), 1);

    // No section left to grow
    vm.push("items", "c");
    assert_eq!(vm.inner_html(root), "<ul></ul>");

    vm.set("open", true);
    assert_eq!(
        vm.inner_html(root),
        "<ul><li>a</li><li>b</li><li>c</li></ul>"
    );
}

// =============================================================================
// WARNINGS
// =============================================================================

#[test]
fn test_non_array_source_warns() {
    let (vm, root) = mount(
        r#"<ul><li v-for="item in title">{{ item }}</li></ul>"#,
        json!({"title": "x"}),
    );
    assert_eq!(vm.inner_html(root), "");
    assert_eq!(vm.warnings(), vec![Warning::ListSource(Path::parse("title"))]);
}

#[test]
fn test_array_replaced_by_scalar_clears() {
    let (vm, root) = mount(
        r#"<ul><li v-for="item in items">{{ item }}</li></ul>"#,
        json!({"items": ["a"]}),
    );
    vm.set("items", Value::Null);
    assert_eq!(vm.inner_html(root), "");
    assert_eq!(vm.warnings(), vec![Warning::ListSource(Path::parse("items"))]);
}

#[test]
fn test_malformed_for_expression() {
    let (vm, root) = mount(
        r#"<ul><li v-for="items">{{ item }}</li></ul>"#,
        json!({"items": ["a"]}),
    );
    assert_eq!(vm.inner_html(root), "");
    assert_eq!(
        vm.warnings(),
        vec![Warning::MalformedExpression {
            directive: "v-for".to_string(),
            expression: "items".to_string(),
        }]
    );
}
