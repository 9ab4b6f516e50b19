mod common;

use arbor::strategy::RenderProvider;
use arbor::{CancelToken, Node, RenderConfig, Tree};

fn labels(lines: &[arbor::RenderedLine]) -> Vec<&str> {
    lines.iter().map(|line| line.label.as_str()).collect()
}

#[test]
fn test_window_follows_focus() {
    common::init_logging();
    let tree = common::siblings(10);
    let cancel = CancelToken::new();

    let lines = tree.render_window(&cancel, 5).unwrap();
    assert_eq!(
        labels(&lines),
        vec!["sibling 1", "sibling 2", "sibling 3", "sibling 4", "sibling 5"]
    );

    tree.set_focused_id("s8").unwrap();
    let lines = tree.render_window(&cancel, 5).unwrap();
    assert_eq!(
        labels(&lines),
        vec!["sibling 4", "sibling 5", "sibling 6", "sibling 7", "sibling 8"]
    );
    assert_eq!(tree.scroll_offset(), 3);
    assert!(lines[4].focused);
    assert_eq!(lines[4].index, 7);
}

#[test]
fn test_window_scrolls_back_up() {
    let tree = common::siblings(10);
    let cancel = CancelToken::new();
    tree.set_scroll_offset(6);
    tree.set_focused_id("s2").unwrap();

    let lines = tree.render_window(&cancel, 3).unwrap();
    assert_eq!(labels(&lines), vec!["sibling 2", "sibling 3", "sibling 4"]);
    assert_eq!(tree.scroll_offset(), 1);
}

#[test]
fn test_window_keeps_prefixes_below_offset() {
    let tree = Tree::new(vec![
        Node::new("a", "", ())
            .with_expanded(true)
            .with_children(vec![Node::new("a1", "", ()), Node::new("a2", "", ())]),
        Node::new("b", "", ()),
    ]);
    tree.set_scroll_offset(2);

    let lines = tree.render_window(&CancelToken::new(), 2).unwrap();
    let text: Vec<String> = lines.iter().map(|line| line.text()).collect();
    assert_eq!(text, vec!["│   └──   a2", "└──   b"]);
}

#[test]
fn test_plain_render_has_every_visible_line() {
    let tree = common::siblings(30);
    tree.set_scroll_offset(10);
    let text = tree.render(&CancelToken::new()).unwrap();
    assert_eq!(text.lines().count(), 30);
    assert!(text.starts_with("├──   sibling 1\n"));
    assert!(text.ends_with("└──   sibling 30\n"));
}

struct Emoji;

impl RenderProvider<usize> for Emoji {
    fn icon(&self, node: &Node<usize>) -> String {
        if node.data() % 2 == 0 { "📁📁".into() } else { "x".into() }
    }

    fn format(&self, node: &Node<usize>) -> String {
        format!("#{}", node.data())
    }

    fn style(&self, node: &Node<usize>, focused: bool) -> String {
        format!("{}:{}", node.id(), focused)
    }
}

#[test]
fn test_custom_provider_and_icon_width() {
    let tree = common::siblings(2);
    tree.set_provider(Emoji);
    tree.set_render_config(RenderConfig { icon_width: 3 });
    tree.set_focused_id("s2").unwrap();

    let lines = tree.render_lines(&CancelToken::new()).unwrap();
    assert_eq!(lines[0].icon, "x  ");
    assert_eq!(lines[1].icon, "📁 ");
    assert_eq!(lines[1].label, "#2");
    assert_eq!(lines[1].style, "s2:true");
    assert_eq!(lines[0].style, "s1:false");
}

#[test]
fn test_render_config_from_json() {
    let config: RenderConfig = serde_json::from_str("{}").unwrap();
    assert_eq!(config, RenderConfig::default());
    let config: RenderConfig = serde_json::from_str(r#"{"icon_width": 4}"#).unwrap();
    assert_eq!(config.icon_width, 4);
}

#[test]
fn test_cancelled_render() {
    let tree = common::siblings(3);
    let cancel = CancelToken::new();
    cancel.cancel();
    assert!(tree.render(&cancel).unwrap_err().is_cancellation());
    assert!(tree.render_window(&cancel, 2).is_err());
}
