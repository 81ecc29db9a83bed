//! End-to-end scenarios driven through the session, the way a host
//! application would: server events in, user edits, undo/redo.

use std::sync::mpsc::Receiver;

use zestbay_canvas::arrange::{ArrangeMode, LayoutMode, Point};
use zestbay_canvas::graph::{PRETTY_NAME_KEY, PortDescriptor, PortDirection, PortId, PortType};
use zestbay_canvas::naming::{CustomNames, NamingPolicy};
use zestbay_canvas::server::{self, EventInbox, GraphEvent, MetadataTarget, ServerCommand};
use zestbay_canvas::views::{BoxId, BoxSide, ViewStore};
use zestbay_canvas::{EditError, ManualTimer, Session, Settings};

fn session_with(settings: Settings) -> (Session, ManualTimer, Receiver<ServerCommand>) {
    let (sink, rx) = server::channel();
    let timer = ManualTimer::new();
    let session = Session::new(settings, sink, Box::new(timer.clone()));
    (session, timer, rx)
}

fn session() -> (Session, ManualTimer, Receiver<ServerCommand>) {
    session_with(Settings::default())
}

fn add(s: &mut Session, id: PortId, name: &str, dir: PortDirection) {
    s.handle_event(GraphEvent::PortAdded(PortDescriptor::new(
        id,
        name,
        PortType::Audio,
        dir,
    )));
}

fn connect(s: &mut Session, output: PortId, input: PortId) {
    s.handle_event(GraphEvent::ConnectionAdded { output, input });
}

/// Views and custom names, the state every command acts on
fn edit_state(s: &Session) -> (ViewStore, CustomNames) {
    (s.views().clone(), s.resolver().custom_names().clone())
}

#[test]
fn synth_to_mixer_signal_chain() {
    let (mut s, _, _) = session();
    add(&mut s, 1, "Synth:out", PortDirection::Output);
    add(&mut s, 2, "Mixer:in", PortDirection::Input);
    connect(&mut s, 1, 2);

    s.arrange_view(ArrangeMode::SignalChain).unwrap();

    let c = s.settings().canvas.clone();
    let synth = s.views().group_pos(1, "Synth").unwrap().joined.pos;
    let mixer = s.views().group_pos(1, "Mixer").unwrap().joined.pos;
    assert_eq!(synth.x, c.origin.x);
    assert!(mixer.x >= c.origin.x + c.column_width + c.column_spacing);
    assert_eq!(
        s.views().active_view().unwrap().arrangement,
        ArrangeMode::SignalChain
    );
}

#[test]
fn rename_with_auto_export_writes_metadata_once() {
    let mut settings = Settings::default();
    settings.naming.auto_export = true;
    let (mut s, _, rx) = session_with(settings);
    add(&mut s, 1, "Synth:out", PortDirection::Output);

    s.rename_group("Synth", Some("Lead Synth")).unwrap();

    let sent: Vec<ServerCommand> = rx.try_iter().collect();
    assert_eq!(
        sent,
        vec![ServerCommand::SetMetadata {
            target: MetadataTarget::Group("Synth".to_string()),
            key: PRETTY_NAME_KEY.to_string(),
            value: Some("Lead Synth".to_string()),
        }]
    );
    assert_eq!(s.names().group("Synth"), "Lead Synth");
}

#[test]
fn rename_without_auto_export_stays_local() {
    let (mut s, _, rx) = session();
    add(&mut s, 1, "Synth:out", PortDirection::Output);
    s.rename_group("Synth", Some("Lead")).unwrap();
    assert!(rx.try_recv().is_err());
}

#[test]
fn group_survives_grace_window_with_custom_name() {
    let (mut s, timer, _) = session();
    add(&mut s, 1, "Synth:out", PortDirection::Output);
    s.rename_group("Synth", Some("Lead")).unwrap();

    let diff = s.handle_event(GraphEvent::PortRemoved(1));
    assert_eq!(diff.removals_scheduled.len(), 1);
    assert_eq!(timer.pending().len(), 1);

    let diff = s.handle_event(GraphEvent::PortAdded(PortDescriptor::new(
        7,
        "Synth:out",
        PortType::Audio,
        PortDirection::Output,
    )));
    assert!(diff.groups_removed.is_empty());
    assert!(diff.groups_added.is_empty());
    assert_eq!(diff.removals_cancelled.len(), 1);
    assert!(timer.pending().is_empty());
    assert_eq!(s.names().group("Synth"), "Lead");
}

#[test]
fn stale_grace_token_is_ignored() {
    let (mut s, timer, _) = session();
    add(&mut s, 1, "Synth:out", PortDirection::Output);
    s.handle_event(GraphEvent::PortRemoved(1));
    let token = timer.pending()[0];
    add(&mut s, 2, "Synth:out", PortDirection::Output);

    let diff = s.on_grace_expired(token);
    assert!(diff.is_empty());
    assert!(s.graph().group("Synth").is_some());
}

#[test]
fn five_box_drag_undo_redo() {
    let (mut s, _, _) = session();
    for (i, name) in ["a", "b", "c", "d", "e"].iter().enumerate() {
        add(&mut s, i as PortId + 1, &format!("{}:out", name), PortDirection::Output);
    }
    let before = s.box_positions();

    let moves: Vec<(BoxId, Point)> = ["a", "b", "c", "d", "e"]
        .iter()
        .enumerate()
        .map(|(i, k)| (BoxId::new(*k, BoxSide::Joined), Point::new(500 + 30 * i as i32, 400)))
        .collect();
    assert_eq!(s.move_boxes(&moves).unwrap(), "Move 5 boxes");
    let after = s.box_positions();
    assert_ne!(before, after);
    assert_eq!(
        after[&BoxId::new("e", BoxSide::Joined)].pos,
        Point::new(620, 400)
    );

    assert_eq!(s.undo(), Ok(Some("Move 5 boxes".to_string())));
    assert_eq!(s.box_positions(), before);

    assert_eq!(s.redo(), Ok(Some("Move 5 boxes".to_string())));
    assert_eq!(s.box_positions(), after);
}

#[test]
fn every_command_reverts_exactly() {
    let (mut s, timer, _) = session();
    add(&mut s, 1, "Synth:out_L", PortDirection::Output);
    add(&mut s, 2, "Synth:out_R", PortDirection::Output);
    add(&mut s, 3, "Mixer:in", PortDirection::Input);
    add(&mut s, 4, "Gone:out", PortDirection::Output);
    connect(&mut s, 1, 3);
    s.handle_event(GraphEvent::PortRemoved(4));
    for token in timer.take_pending() {
        s.on_grace_expired(token);
    }
    s.create_view("Second").unwrap();

    let portgroup = s.graph().portgroups().next().map(|pg| pg.id).unwrap();
    let synth = BoxId::new("Synth", BoxSide::Joined);

    type Edit = Box<dyn Fn(&mut Session) -> Result<String, EditError>>;
    let edits: Vec<Edit> = vec![
        Box::new(|s| s.move_boxes(&[(BoxId::new("Mixer", BoxSide::Joined), Point::new(300, 300))])),
        Box::new(|s| s.split_group("Mixer")),
        Box::new(move |s| s.set_box_layout(&synth, LayoutMode::ForceLarge)),
        Box::new(|s| s.set_box_wrapped(&BoxId::new("Synth", BoxSide::Joined), true)),
        Box::new(|s| s.set_box_hidden(&BoxId::new("Synth", BoxSide::Joined), true)),
        Box::new(|s| s.rename_group("Synth", Some("Lead"))),
        Box::new(|s| s.rename_port(3, Some("Main in"))),
        Box::new(move |s| s.rename_portgroup(portgroup, Some("Stereo out"))),
        Box::new(|s| s.create_view("Third").map(|n| n.to_string())),
        Box::new(|s| s.remove_view(2)),
        Box::new(|s| s.rename_view(2, "Renamed")),
        Box::new(|s| s.renumber_view(2, 1)),
        Box::new(|s| s.renumber_view(2, 9)),
        Box::new(|s| s.switch_view(2)),
        Box::new(|s| s.clear_view(1)),
        Box::new(|s| s.forget_absent(1)),
        Box::new(|s| s.purge_other_views(1)),
        Box::new(|s| s.arrange_view(ArrangeMode::FacingColumns)),
    ];

    for (i, edit) in edits.iter().enumerate() {
        let before = edit_state(&s);
        let graph_before = s.graph().snapshot();
        edit(&mut s).unwrap_or_else(|e| panic!("edit {} failed: {}", i, e));
        assert_ne!(edit_state(&s), before, "edit {} changed nothing", i);

        assert!(s.undo().unwrap().is_some());
        assert_eq!(edit_state(&s), before, "edit {} did not revert", i);
        assert_eq!(s.graph().snapshot(), graph_before);

        // leave the redo tail behind for the next edit
        let applied = s.redo().unwrap();
        assert!(applied.is_some());
        s.undo().unwrap();
    }
}

#[test]
fn switching_views_leaves_graph_alone() {
    let (mut s, _, _) = session();
    add(&mut s, 1, "Synth:out", PortDirection::Output);
    add(&mut s, 2, "Mixer:in", PortDirection::Input);
    connect(&mut s, 1, 2);
    let graph_before = s.graph().snapshot();

    let second = s.create_view("Second").unwrap();
    s.switch_view(second).unwrap();
    assert_eq!(s.graph().snapshot(), graph_before);

    // the new view projects positions without storing them
    assert!(s.views().view(second).unwrap().groups.is_empty());
    assert_eq!(s.box_positions().len(), 2);

    s.switch_view(1).unwrap();
    assert_eq!(s.graph().snapshot(), graph_before);
}

#[test]
fn new_group_in_arranged_view_takes_arranged_position() {
    let (mut s, _, _) = session();
    add(&mut s, 1, "Synth:out", PortDirection::Output);
    add(&mut s, 2, "Mixer:in", PortDirection::Input);
    connect(&mut s, 1, 2);
    s.arrange_view(ArrangeMode::FacingColumns).unwrap();

    add(&mut s, 3, "Rec:in", PortDirection::Input);
    let rec = s.views().group_pos(1, "Rec").unwrap().joined.pos;
    let mixer = s.views().group_pos(1, "Mixer").unwrap().joined.pos;
    // inputs-only groups go to the right column
    assert_eq!(rec.x, mixer.x);
    assert!(rec.y > mixer.y);
}

#[test]
fn last_view_cannot_be_removed() {
    let (mut s, _, _) = session();
    assert!(matches!(s.remove_view(1), Err(EditError::View(_))));
    assert!(!s.history().can_undo());
    assert_eq!(s.undo(), Ok(None));
}

#[test]
fn connection_events_with_unknown_ports_warn() {
    let (mut s, _, _) = session();
    add(&mut s, 1, "Synth:out", PortDirection::Output);
    let diff = s.handle_event(GraphEvent::ConnectionAdded {
        output: 1,
        input: 42,
    });
    assert_eq!(diff.warnings.len(), 1);
    assert_eq!(s.graph().connection_count(), 0);
}

#[test]
fn inbox_delivers_events_from_another_thread() {
    let (mut s, _, _) = session();
    let inbox = EventInbox::new();
    let producer = inbox.clone();
    std::thread::spawn(move || {
        for id in 1..=4 {
            producer.push(GraphEvent::PortAdded(PortDescriptor::new(
                id,
                format!("client{}:out", id),
                PortType::Midi,
                PortDirection::Output,
            )));
        }
    })
    .join()
    .unwrap();

    let diff = s.process_inbox(&inbox);
    assert_eq!(diff.groups_added.len(), 4);
    assert_eq!(s.filter().visible_boxes().len(), 4);
    assert!(inbox.is_empty());
}

#[test]
fn scene_round_trips_through_json() {
    let (mut s, _, _) = session();
    add(&mut s, 1, "Synth:out", PortDirection::Output);
    s.rename_group("Synth", Some("Lead")).unwrap();
    s.create_view("Live").unwrap();
    s.set_naming_policy(NamingPolicy {
        auto_export: true,
        ..NamingPolicy::default()
    });

    let json = s.scene().to_json_pretty().unwrap();
    let doc = zestbay_canvas::scene::SceneDocument::from_json(&json).unwrap();

    let (mut fresh, _, _) = session();
    add(&mut fresh, 1, "Synth:out", PortDirection::Output);
    fresh.load_scene(&doc).unwrap();
    assert_eq!(fresh.scene(), s.scene());
    assert_eq!(fresh.names().group("Synth"), "Lead");
    assert!(!fresh.history().can_undo());
}
