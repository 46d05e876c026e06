use std::cell::RefCell;
use std::rc::Rc;

use infohub::models::*;
use infohub::persist::MemoryStore;
use speculate2::speculate;

fn new_tree(source: &str) -> ContentTree {
    ContentTree::new(source, Box::new(MemoryStore::new())).expect("Failed to create tree")
}

fn blocks(tree: &mut ContentTree, line: NodeId, texts: &[&str]) -> Vec<NodeId> {
    texts
        .iter()
        .map(|text| tree.create_text_block(line, Some(*text)).expect("Failed to create block"))
        .collect()
}

speculate! {
    before {
        let mut tree = new_tree("X");
        let root = tree.root();
    }

    describe "construction" {
        it "builds filesystem paths from names" {
            let a = tree.create_folder(root, "A").unwrap();
            let d = tree.create_document(a, "d", "text/plain").unwrap();

            assert_eq!(tree.children(root).unwrap().len(), 1);
            assert_eq!(tree.children(a).unwrap().len(), 1);
            assert_eq!(tree.path(d).unwrap(), "/A/d");
            assert_eq!(tree.parent(d).unwrap(), Some(a));
            assert_eq!(tree.root_folder(d).unwrap(), Some(root));
        }

        it "gives the root folder its source" {
            let node = tree.node(root).unwrap();
            assert!(node.kind().is_root());
            assert_eq!(node.kind().source(), Some("X"));
            assert_eq!(tree.source(), "X");
            assert_eq!(tree.parent(root).unwrap(), None);
        }

        it "keeps content out of folders" {
            let err = tree.create_text_line(root).unwrap_err();
            assert!(err.is_invalid_argument());
            assert_eq!(tree.children(root).unwrap().len(), 0);
        }

        it "keeps filesystem nodes out of content" {
            let d = tree.create_plain_text_document(root, "d").unwrap();
            let line = tree.create_text_line(d).unwrap();
            let err = tree.create_folder(line, "F").unwrap_err();
            assert!(err.is_invalid_argument());
        }

        it "rejects children of leaf kinds" {
            let d = tree.create_plain_text_document(root, "d").unwrap();
            let line = tree.create_text_line(d).unwrap();
            let block = tree.create_text_block(line, None).unwrap();
            assert!(tree.create_object(block).unwrap_err().is_invalid_argument());
        }

        it "rejects empty names and names with separators" {
            assert!(tree.create_folder(root, "a/b").unwrap_err().is_invalid_argument());
            assert!(tree.create_folder(root, "").unwrap_err().is_invalid_argument());
        }

        it "reports the nearest filesystem parent of content" {
            let a = tree.create_folder(root, "A").unwrap();
            let d = tree.create_rich_text_document(a, "d.html", "text/html").unwrap();
            let line = tree.create_text_line(d).unwrap();
            let block = tree.create_text_block(line, Some("hi")).unwrap();

            assert_eq!(tree.file_system_parent(block).unwrap(), Some(d));
            assert_eq!(tree.file_system_parent(d).unwrap(), Some(a));
            assert!(tree.path(block).unwrap_err().is_invalid_argument());
        }
    }

    describe "ancestry" {
        it "treats ancestor and descendant as inverse relations" {
            let a = tree.create_folder(root, "A").unwrap();
            let b = tree.create_folder(a, "B").unwrap();
            let d = tree.create_plain_text_document(b, "d").unwrap();

            for (x, y) in [(root, a), (a, b), (a, d), (root, d), (b, a), (d, a)] {
                assert_eq!(
                    tree.is_ancestor_of(x, y).unwrap(),
                    tree.is_descendant_of(y, x).unwrap()
                );
            }
            assert!(tree.is_ancestor_of(a, d).unwrap());
            assert!(!tree.is_ancestor_of(b, a).unwrap());
            assert!(!tree.is_ancestor_of(a, a).unwrap());
        }

        it "fails for unknown nodes" {
            let err = tree.is_ancestor_of(root, NodeId::new()).unwrap_err();
            assert!(matches!(err, infohub::ContentError::UnknownNode(_)));
        }
    }

    describe "move_node" {
        it "moves a document between folders" {
            let f1 = tree.create_folder(root, "F1").unwrap();
            let f2 = tree.create_folder(root, "F2").unwrap();
            let d1 = tree.create_plain_text_document(f1, "d1").unwrap();
            tree.create_plain_text_document(f1, "d2").unwrap();
            tree.create_plain_text_document(f2, "d3").unwrap();

            tree.move_node(d1, f2, Some(0)).unwrap();

            assert_eq!(tree.children(f1).unwrap().len(), 1);
            assert_eq!(tree.children(f2).unwrap().len(), 2);
            assert_eq!(tree.children(f2).unwrap()[0], d1);
            assert_eq!(tree.parent(d1).unwrap(), Some(f2));
            assert_eq!(tree.path(d1).unwrap(), "/F2/d1");
        }

        it "notifies observers of the moved node once" {
            let f1 = tree.create_folder(root, "F1").unwrap();
            let f2 = tree.create_folder(root, "F2").unwrap();
            let d1 = tree.create_plain_text_document(f1, "d1").unwrap();

            let events = Rc::new(RefCell::new(Vec::new()));
            let sink = events.clone();
            tree.subscribe(d1, move |event: &ChangeEvent| sink.borrow_mut().push(event.clone()))
                .unwrap();

            tree.move_node(d1, f2, None).unwrap();
            tree.move_node(d1, f2, None).unwrap();

            assert_eq!(
                *events.borrow(),
                vec![ChangeEvent {
                    node: d1,
                    change: Change::Moved { from: f1, to: f2, index: 0 },
                }]
            );
        }

        it "refuses to move a node below itself" {
            let a = tree.create_folder(root, "A").unwrap();
            let b = tree.create_folder(a, "B").unwrap();

            assert!(tree.move_node(a, b, None).unwrap_err().is_invalid_argument());
            assert!(tree.move_node(a, a, None).unwrap_err().is_invalid_argument());
            assert_eq!(tree.parent(a).unwrap(), Some(root));
        }

        it "refuses to move the root" {
            let a = tree.create_folder(root, "A").unwrap();
            assert!(tree.move_node(root, a, None).unwrap_err().is_not_supported());
        }

        it "rejects an index past the end" {
            let f1 = tree.create_folder(root, "F1").unwrap();
            let f2 = tree.create_folder(root, "F2").unwrap();
            let d1 = tree.create_plain_text_document(f1, "d1").unwrap();

            let err = tree.move_node(d1, f2, Some(1)).unwrap_err();
            assert!(matches!(err, infohub::ContentError::OutOfRange { index: 1, len: 0 }));
            assert_eq!(tree.parent(d1).unwrap(), Some(f1));
        }

        it "rejects a destination of the wrong kind" {
            let d = tree.create_plain_text_document(root, "d").unwrap();
            let line = tree.create_text_line(d).unwrap();
            let a = tree.create_folder(root, "A").unwrap();
            assert!(tree.move_node(line, a, None).unwrap_err().is_invalid_argument());
        }
    }

    describe "carve_out" {
        before {
            let d = tree.create_plain_text_document(root, "d").unwrap();
            let source = tree.create_text_line(d).unwrap();
            let destination = tree.create_text_line(d).unwrap();
            let moving = blocks(&mut tree, source, &["one", "two", "three"]);
            let existing = blocks(&mut tree, destination, &["four"]);
        }

        it "relocates a range keeping its order" {
            tree.carve_out(source, destination, 0, 1, 2).unwrap();

            assert_eq!(tree.children(source).unwrap(), &[moving[0]]);
            assert_eq!(
                tree.children(destination).unwrap(),
                &[moving[1], moving[2], existing[0]]
            );
            assert_eq!(tree.parent(moving[2]).unwrap(), Some(destination));
        }

        it "appends at the end of the destination" {
            tree.carve_out(source, destination, 1, 0, 3).unwrap();
            assert!(tree.children(source).unwrap().is_empty());
            assert_eq!(
                tree.children(destination).unwrap(),
                &[existing[0], moving[0], moving[1], moving[2]]
            );
        }

        it "fails on a range past the source and changes nothing" {
            let err = tree.carve_out(source, destination, 0, 2, 2).unwrap_err();

            assert!(matches!(err, infohub::ContentError::OutOfRange { .. }));
            assert_eq!(tree.children(source).unwrap(), moving.as_slice());
            assert_eq!(tree.children(destination).unwrap(), existing.as_slice());
        }

        it "fails on a destination index past the end and changes nothing" {
            let err = tree.carve_out(source, destination, 2, 0, 1).unwrap_err();

            assert!(err.is_invalid_argument());
            assert_eq!(tree.children(source).unwrap(), moving.as_slice());
        }

        it "moves nothing for an empty range" {
            tree.carve_out(source, destination, 0, 3, 0).unwrap();
            assert_eq!(tree.children(source).unwrap().len(), 3);
            assert_eq!(tree.children(destination).unwrap().len(), 1);
        }

        it "reorders within a single container" {
            tree.carve_out(source, source, 0, 1, 2).unwrap();

            assert_eq!(tree.children(source).unwrap(), &[moving[1], moving[2], moving[0]]);
            assert_eq!(tree.parent(moving[1]).unwrap(), Some(source));
        }

        it "counts a reorder's destination without the carved range" {
            let err = tree.carve_out(source, source, 2, 1, 2).unwrap_err();

            assert!(matches!(err, infohub::ContentError::OutOfRange { index: 2, len: 1 }));
            assert_eq!(tree.children(source).unwrap(), moving.as_slice());
        }
    }

    describe "text and references" {
        it "notifies text changes only when the text differs" {
            let d = tree.create_plain_text_document(root, "d").unwrap();
            let line = tree.create_text_line(d).unwrap();
            let block = tree.create_text_block(line, Some("a")).unwrap();

            let count = Rc::new(RefCell::new(0));
            let sink = count.clone();
            let subscription = tree.subscribe(block, move |_: &ChangeEvent| *sink.borrow_mut() += 1).unwrap();

            assert!(tree.set_text(block, "b").unwrap());
            assert!(!tree.set_text(block, "b").unwrap());
            assert!(tree.unsubscribe(block, subscription).unwrap());
            assert!(tree.set_text(block, "c").unwrap());

            assert_eq!(*count.borrow(), 1);
            assert_eq!(tree.node(block).unwrap().kind().text(), Some("c"));
        }

        it "keeps named references" {
            let a = tree.create_folder(root, "A").unwrap();
            let d = tree.create_plain_text_document(root, "d").unwrap();
            let line = tree.create_text_line(d).unwrap();

            assert_eq!(tree.set_reference(line, "see", a).unwrap(), None);
            assert_eq!(tree.reference(line, "see").unwrap(), Some(a));
            assert_eq!(tree.remove_reference(line, "see").unwrap(), Some(a));
            assert_eq!(tree.reference(line, "see").unwrap(), None);
        }

        it "creates property bags on first use" {
            let a = tree.create_folder(root, "A").unwrap();
            assert!(tree.property_bag(a).unwrap().is_none());

            tree.property_bag_mut(a).unwrap().insert("color".to_string(), PropertyValue::from("red"));
            let bag = tree.property_bag(a).unwrap().unwrap();
            assert_eq!(bag.get("color"), Some(&PropertyValue::from("red")));
        }
    }
}
