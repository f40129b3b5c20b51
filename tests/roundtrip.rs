use glam::{DMat4, DQuat, DVec3};
use stagesync::{
    Document, PrimPath, SyncError, SyncOpts, SyncSession, TranslateOnlyPolicy, XformOp,
    XformOpKind, XformOpValue,
};
use std::path::{Path, PathBuf};

fn p(s: &str) -> PrimPath {
    PrimPath::parse(s).unwrap()
}

fn write_doc(dir: &Path, name: &str, build: impl FnOnce(&mut Document)) -> PathBuf {
    let path = dir.join(name);
    let mut doc = Document::create_new(&path);
    build(&mut doc);
    doc.save().unwrap();
    path
}

fn find_node(session: &SyncSession, origin: &str) -> stagesync::NodeId {
    let origin = p(origin);
    session
        .scene()
        .node_ids()
        .find(|id| {
            session.scene().get(*id).unwrap().meta.origin_path.as_ref() == Some(&origin)
        })
        .unwrap()
}

fn canonical_trs_doc(dir: &Path) -> PathBuf {
    write_doc(dir, "world.json", |doc| {
        let world = p("/World");
        doc.define_prim(&world, "Xform").unwrap();
        doc.add_xform_op(&world, XformOp::translate(DVec3::ZERO)).unwrap();
        doc.add_xform_op(&world, XformOp::orient(DQuat::from_rotation_y(0.3)))
            .unwrap();
        doc.add_xform_op(&world, XformOp::scale(DVec3::splat(2.0))).unwrap();
    })
}

#[test]
fn load_then_save_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_doc(dir.path(), "scene.json", |doc| {
        let world = p("/World");
        doc.define_prim(&world, "Xform").unwrap();
        doc.add_xform_op(&world, XformOp::translate(DVec3::new(1.0, 2.0, 3.0)))
            .unwrap();
        let child = p("/World/child");
        doc.define_prim(&child, "Xform").unwrap();
        doc.add_xform_op(&child, XformOp::matrix(DMat4::from_rotation_z(0.5)))
            .unwrap();
        doc.define_prim(&p("/World/empty"), "Xform").unwrap();
    });
    let before = std::fs::read_to_string(&path).unwrap();

    let mut session = SyncSession::default();
    let load = session.load(&path).unwrap();
    assert!(load.is_clean());
    assert_eq!(load.nodes_created, 3);

    let save = session.save().unwrap();
    assert!(save.is_clean());
    assert!(save.wrote_nothing());
    assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
}

#[test]
fn canonical_trs_moves_only_the_changed_field() {
    let dir = tempfile::tempdir().unwrap();
    let path = canonical_trs_doc(dir.path());
    let ops_before = Document::open(&path).unwrap().ordered_xform_ops(&p("/World")).unwrap();

    let mut session = SyncSession::default();
    session.load(&path).unwrap();

    // move to (1,0,0), leave rotation and scale alone
    let id = find_node(&session, "/World");
    let node = session.scene_mut().get_mut(id).unwrap();
    node.local_transform = DMat4::from_scale_rotation_translation(
        DVec3::splat(2.0),
        DQuat::from_rotation_y(0.3),
        DVec3::new(1.0, 0.0, 0.0),
    );

    let save = session.save().unwrap();
    assert!(save.is_clean());
    assert_eq!(save.updated, vec![p("/World")]);

    let ops_after = Document::open(&path).unwrap().ordered_xform_ops(&p("/World")).unwrap();
    assert_eq!(
        ops_after[0],
        XformOp::translate(DVec3::new(1.0, 0.0, 0.0))
    );
    // orient and scale are untouched, not rewritten
    assert_eq!(ops_after[1], ops_before[1]);
    assert_eq!(ops_after[2], ops_before[2]);

    // a second save with no further edits writes nothing, even though the
    // baseline was not refreshed
    let again = session.save().unwrap();
    assert!(again.wrote_nothing());
}

#[test]
fn euler_stack_rejects_rotation_and_stays_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_doc(dir.path(), "euler.json", |doc| {
        let world = p("/World");
        doc.define_prim(&world, "Xform").unwrap();
        doc.add_xform_op(&world, XformOp::translate(DVec3::ZERO)).unwrap();
        doc.add_xform_op(
            &world,
            XformOp {
                kind: XformOpKind::RotateXyz,
                value: XformOpValue::Vec3(DVec3::new(10.0, 0.0, 0.0)),
            },
        )
        .unwrap();
        doc.add_xform_op(&world, XformOp::scale(DVec3::ONE)).unwrap();
    });
    let before = std::fs::read_to_string(&path).unwrap();

    let mut session = SyncSession::default();
    session.load(&path).unwrap();

    // change position *and* rotation: the rotation makes the whole node
    // fail, and not even the position may be written
    let id = find_node(&session, "/World");
    let node = session.scene_mut().get_mut(id).unwrap();
    node.local_transform =
        DMat4::from_translation(DVec3::X) * DMat4::from_rotation_x(0.9);

    let save = session.save().unwrap();
    assert_eq!(save.failures.len(), 1);
    assert!(matches!(
        save.failures[0].error,
        SyncError::UnsupportedRotationConversion { .. }
    ));
    assert!(save.updated.is_empty());
    assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
}

#[test]
fn euler_stack_updates_position_and_scale() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_doc(dir.path(), "euler.json", |doc| {
        let world = p("/World");
        doc.define_prim(&world, "Xform").unwrap();
        doc.add_xform_op(&world, XformOp::translate(DVec3::ZERO)).unwrap();
        doc.add_xform_op(
            &world,
            XformOp {
                kind: XformOpKind::RotateXyz,
                value: XformOpValue::Vec3(DVec3::ZERO),
            },
        )
        .unwrap();
        doc.add_xform_op(&world, XformOp::scale(DVec3::ONE)).unwrap();
    });

    let mut session = SyncSession::default();
    session.load(&path).unwrap();
    let id = find_node(&session, "/World");
    session.scene_mut().get_mut(id).unwrap().local_transform =
        DMat4::from_translation(DVec3::new(0.0, 5.0, 0.0)) * DMat4::from_scale(DVec3::splat(3.0));

    let save = session.save().unwrap();
    assert!(save.is_clean(), "{:?}", save.failures);

    let doc = Document::open(&path).unwrap();
    let ops = doc.ordered_xform_ops(&p("/World")).unwrap();
    assert_eq!(ops[0], XformOp::translate(DVec3::new(0.0, 5.0, 0.0)));
    assert_eq!(
        ops[1].value,
        XformOpValue::Vec3(DVec3::ZERO),
        "rotation op untouched"
    );
    assert_eq!(ops[2], XformOp::scale(DVec3::splat(3.0)));
}

#[test]
fn empty_stack_appends_only_changed_fields() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_doc(dir.path(), "empty.json", |doc| {
        doc.define_prim(&p("/World"), "Xform").unwrap();
    });

    let mut session = SyncSession::default();
    session.load(&path).unwrap();
    let id = find_node(&session, "/World");
    session.scene_mut().get_mut(id).unwrap().local_transform =
        DMat4::from_quat(DQuat::from_rotation_z(0.25));

    let save = session.save().unwrap();
    assert!(save.is_clean());

    let doc = Document::open(&path).unwrap();
    let ops = doc.ordered_xform_ops(&p("/World")).unwrap();
    assert_eq!(ops.len(), 1, "only the rotated field gets an op");
    assert_eq!(ops[0].kind, XformOpKind::Orient);
}

#[test]
fn single_matrix_overwrites_wholesale() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_doc(dir.path(), "matrix.json", |doc| {
        let world = p("/World");
        doc.define_prim(&world, "Xform").unwrap();
        doc.add_xform_op(&world, XformOp::matrix(DMat4::IDENTITY)).unwrap();
    });

    let mut session = SyncSession::default();
    session.load(&path).unwrap();
    let id = find_node(&session, "/World");
    let live = DMat4::from_scale_rotation_translation(
        DVec3::new(1.0, 2.0, 1.0),
        DQuat::from_rotation_x(1.1),
        DVec3::new(-4.0, 0.0, 2.5),
    );
    session.scene_mut().get_mut(id).unwrap().local_transform = live;

    session.save().unwrap();
    let doc = Document::open(&path).unwrap();
    let ops = doc.ordered_xform_ops(&p("/World")).unwrap();
    assert_eq!(ops[0].value, XformOpValue::Matrix(live));
}

#[test]
fn known_unsupported_stack_is_rewritten_as_canonical_trs() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_doc(dir.path(), "partial.json", |doc| {
        let world = p("/World");
        doc.define_prim(&world, "Xform").unwrap();
        doc.add_xform_op(&world, XformOp::translate(DVec3::ZERO)).unwrap();
        doc.add_xform_op(
            &world,
            XformOp {
                kind: XformOpKind::RotateX,
                value: XformOpValue::Scalar(45.0),
            },
        )
        .unwrap();
    });

    let mut session = SyncSession::default();
    session.load(&path).unwrap();
    let id = find_node(&session, "/World");
    session.scene_mut().get_mut(id).unwrap().local_transform =
        DMat4::from_translation(DVec3::new(7.0, 0.0, 0.0));

    let save = session.save().unwrap();
    assert!(save.is_clean());

    let doc = Document::open(&path).unwrap();
    let kinds: Vec<_> = doc
        .ordered_xform_ops(&p("/World"))
        .unwrap()
        .iter()
        .map(|o| o.kind)
        .collect();
    assert_eq!(
        kinds,
        vec![XformOpKind::Translate, XformOpKind::Orient, XformOpKind::Scale]
    );
}

#[test]
fn unknown_stack_fails_without_mutation() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_doc(dir.path(), "unknown.json", |doc| {
        let world = p("/World");
        doc.define_prim(&world, "Xform").unwrap();
        doc.add_xform_op(&world, XformOp::scale(DVec3::ONE)).unwrap();
        doc.add_xform_op(&world, XformOp::translate(DVec3::ZERO)).unwrap();
    });
    let before = std::fs::read_to_string(&path).unwrap();

    let mut session = SyncSession::default();
    session.load(&path).unwrap();
    let id = find_node(&session, "/World");
    session.scene_mut().get_mut(id).unwrap().local_transform =
        DMat4::from_translation(DVec3::Y);

    let save = session.save().unwrap();
    assert_eq!(save.failures.len(), 1);
    assert!(matches!(save.failures[0].error, SyncError::UnknownOpStack { .. }));
    assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
}

#[test]
fn translate_only_policies_diverge_on_scale_edits() {
    for (policy, expect_ops) in [
        (TranslateOnlyPolicy::Strict, 1usize),
        (TranslateOnlyPolicy::Lenient, 2usize),
    ] {
        let dir = tempfile::tempdir().unwrap();
        let path = write_doc(dir.path(), "t.json", |doc| {
            let world = p("/World");
            doc.define_prim(&world, "Xform").unwrap();
            doc.add_xform_op(&world, XformOp::translate(DVec3::ZERO)).unwrap();
        });

        let mut session = SyncSession::new(SyncOpts {
            translate_only: policy,
            ..Default::default()
        });
        session.load(&path).unwrap();
        let id = find_node(&session, "/World");
        session.scene_mut().get_mut(id).unwrap().local_transform =
            DMat4::from_translation(DVec3::X) * DMat4::from_scale(DVec3::splat(2.0));

        let save = session.save().unwrap();
        assert!(save.is_clean());

        let doc = Document::open(&path).unwrap();
        let ops = doc.ordered_xform_ops(&p("/World")).unwrap();
        assert_eq!(ops.len(), expect_ops, "policy {policy:?}");
        assert_eq!(ops[0], XformOp::translate(DVec3::X));
        if policy == TranslateOnlyPolicy::Lenient {
            assert_eq!(ops[1].kind, XformOpKind::Scale);
        }
    }
}

#[test]
fn strict_translate_only_does_not_rewrite_an_applied_position() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_doc(dir.path(), "t.json", |doc| {
        let world = p("/World");
        doc.define_prim(&world, "Xform").unwrap();
        doc.add_xform_op(&world, XformOp::translate(DVec3::ZERO)).unwrap();
    });

    let mut session = SyncSession::default();
    session.load(&path).unwrap();
    let id = find_node(&session, "/World");

    // position and rotation both move; the strict policy persists only
    // the position, so the document can never match the live matrix
    session.scene_mut().get_mut(id).unwrap().local_transform =
        DMat4::from_translation(DVec3::new(2.0, 0.0, 0.0)) * DMat4::from_rotation_z(0.4);

    let save = session.save().unwrap();
    assert!(save.is_clean());
    assert_eq!(save.updated, vec![p("/World")]);

    // with no further edits the position is already authored; later
    // saves must not keep rewriting it
    let again = session.save().unwrap();
    assert!(again.is_clean());
    assert!(again.wrote_nothing());

    let doc = Document::open(&path).unwrap();
    let ops = doc.ordered_xform_ops(&p("/World")).unwrap();
    assert_eq!(ops, vec![XformOp::translate(DVec3::new(2.0, 0.0, 0.0))]);
}

#[test]
fn removed_nodes_leave_stale_bindings_but_save_continues() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_doc(dir.path(), "scene.json", |doc| {
        doc.define_prim(&p("/World"), "Xform").unwrap();
        for name in ["gone", "kept"] {
            let child = p("/World").append(name).unwrap();
            doc.define_prim(&child, "Xform").unwrap();
            doc.add_xform_op(&child, XformOp::translate(DVec3::ZERO)).unwrap();
        }
    });

    let mut session = SyncSession::default();
    session.load(&path).unwrap();
    let gone = find_node(&session, "/World/gone");
    let kept = find_node(&session, "/World/kept");
    session.scene_mut().remove(gone);
    session.scene_mut().get_mut(kept).unwrap().local_transform =
        DMat4::from_translation(DVec3::new(0.0, 2.0, 0.0));

    let save = session.save().unwrap();
    assert_eq!(save.failures.len(), 1);
    assert!(matches!(save.failures[0].error, SyncError::StaleBinding(_)));

    // the surviving node still got written
    assert_eq!(save.updated, vec![p("/World/kept")]);
    let doc = Document::open(&path).unwrap();
    assert_eq!(
        doc.ordered_xform_ops(&p("/World/kept")).unwrap()[0],
        XformOp::translate(DVec3::new(0.0, 2.0, 0.0))
    );
}

#[test]
fn store_baselines_adopts_the_live_transform() {
    let dir = tempfile::tempdir().unwrap();
    let path = canonical_trs_doc(dir.path());
    let before = std::fs::read_to_string(&path).unwrap();

    let mut session = SyncSession::default();
    session.load(&path).unwrap();
    let id = find_node(&session, "/World");
    session.scene_mut().get_mut(id).unwrap().local_transform =
        DMat4::from_translation(DVec3::new(4.0, 4.0, 4.0));

    // after an explicit re-baseline the pending edit is no longer a delta
    session.store_baselines();
    let save = session.save().unwrap();
    assert!(save.wrote_nothing());
    assert_eq!(
        std::fs::read_to_string(&path).unwrap(),
        before,
        "the document still holds the old transform"
    );
}

#[test]
fn refresh_baselines_on_save_moves_the_anchor() {
    let dir = tempfile::tempdir().unwrap();
    let path = canonical_trs_doc(dir.path());

    let mut session = SyncSession::new(SyncOpts {
        refresh_baselines_on_save: true,
        ..Default::default()
    });
    session.load(&path).unwrap();
    let id = find_node(&session, "/World");
    let live = DMat4::from_scale_rotation_translation(
        DVec3::splat(2.0),
        DQuat::from_rotation_y(0.3),
        DVec3::new(9.0, 0.0, 0.0),
    );
    session.scene_mut().get_mut(id).unwrap().local_transform = live;
    session.save().unwrap();

    let baseline = session.binding(id).unwrap().baseline;
    assert!(baseline.abs_diff_eq(live, 1e-9));
}
