use identity_resolve::db::Database;
use identity_resolve::models::*;
use identity_resolve::resolve::ContactFilter;
use speculate2::speculate;

fn observe(email: Option<&str>, phone: Option<&str>) -> Observation {
    Observation::new(email.map(String::from), phone.map(String::from))
        .expect("Invalid observation")
}

fn create_primary(db: &Database, email: Option<&str>, phone: Option<&str>) -> Contact {
    db.create_contact(NewContact::primary(
        email.map(String::from),
        phone.map(String::from),
    ))
    .expect("Failed to create contact")
}

speculate! {
    before {
        let db = Database::open_memory().expect("Failed to create in-memory database");
        db.migrate().expect("Failed to run migrations");
    }

    describe "contacts" {
        describe "create_contact" {
            it "assigns increasing ids and timestamps" {
                let first = create_primary(&db, Some("a@x.com"), None);
                let second = create_primary(&db, None, Some("123"));

                assert!(second.id > first.id);
                assert!(second.created_at >= first.created_at);
                assert_eq!(first.created_at, first.updated_at);
                assert!(first.linked_id.is_none());
                assert!(first.deleted_at.is_none());
            }

            it "persists secondary links" {
                let primary = create_primary(&db, Some("a@x.com"), Some("123"));
                let secondary = db.create_contact(NewContact::secondary(
                    None,
                    Some("456".to_string()),
                    primary.id,
                )).expect("Failed to create");

                let stored = db.get_contact(secondary.id).expect("Query failed").unwrap();
                assert_eq!(stored, secondary);
                assert_eq!(stored.link_precedence, LinkPrecedence::Secondary);
                assert_eq!(stored.linked_id, Some(primary.id));
            }
        }

        describe "get_contact" {
            it "returns None for non-existent contact" {
                let result = db.get_contact(42).expect("Query failed");
                assert!(result.is_none());
            }
        }

        describe "find_contacts" {
            it "matches on email or phone number" {
                let by_email = create_primary(&db, Some("a@x.com"), Some("111"));
                let by_phone = create_primary(&db, Some("b@x.com"), Some("222"));
                create_primary(&db, Some("c@x.com"), Some("333"));

                let found = db.find_contacts(&ContactFilter::by_identifiers(
                    Some("a@x.com"),
                    Some("222"),
                )).expect("Query failed");

                let ids: Vec<i64> = found.iter().map(|c| c.id).collect();
                assert_eq!(ids, vec![by_email.id, by_phone.id]);
            }

            it "skips clauses that are absent" {
                create_primary(&db, None, Some("111"));

                let found = db.find_contacts(&ContactFilter::by_identifiers(Some("a@x.com"), None))
                    .expect("Query failed");
                assert!(found.is_empty());
            }

            it "matches on id or linked id" {
                let primary = create_primary(&db, Some("a@x.com"), None);
                let secondary = db.create_contact(NewContact::secondary(
                    Some("b@x.com".to_string()),
                    None,
                    primary.id,
                )).expect("Failed to create");
                create_primary(&db, Some("c@x.com"), None);

                let found = db.find_contacts(&ContactFilter::by_links(vec![primary.id]))
                    .expect("Query failed");

                let ids: Vec<i64> = found.iter().map(|c| c.id).collect();
                assert_eq!(ids, vec![primary.id, secondary.id]);
            }

            it "hides soft-deleted contacts" {
                let contact = create_primary(&db, Some("a@x.com"), None);
                assert!(db.soft_delete_contact(contact.id).expect("Delete failed"));

                let found = db.find_contacts(&ContactFilter::by_identifiers(Some("a@x.com"), None))
                    .expect("Query failed");
                assert!(found.is_empty());

                let stored = db.get_contact(contact.id).expect("Query failed").unwrap();
                assert!(stored.deleted_at.is_some());
            }
        }

        describe "soft_delete_contact" {
            it "returns false when already deleted" {
                let contact = create_primary(&db, Some("a@x.com"), None);
                assert!(db.soft_delete_contact(contact.id).expect("Delete failed"));
                assert!(!db.soft_delete_contact(contact.id).expect("Delete failed"));
            }

            it "returns false for non-existent contact" {
                assert!(!db.soft_delete_contact(42).expect("Delete failed"));
            }
        }

        describe "reset" {
            it "removes contacts and restarts ids" {
                create_primary(&db, Some("a@x.com"), None);
                create_primary(&db, Some("b@x.com"), None);

                assert_eq!(db.reset().expect("Reset failed"), 2);

                let contact = create_primary(&db, Some("c@x.com"), None);
                assert_eq!(contact.id, 1);
            }
        }
    }

    describe "identify" {
        it "creates a primary for an unknown observation" {
            let view = db.identify(&observe(Some("a@x.com"), Some("123"))).expect("Identify failed");

            let stored = db.get_contact(view.primary_contact_id).expect("Query failed").unwrap();
            assert!(stored.is_primary());
            assert_eq!(stored.email.as_deref(), Some("a@x.com"));
            assert_eq!(stored.phone_number.as_deref(), Some("123"));
            assert!(view.secondary_contact_ids.is_empty());
        }

        it "links a new phone number to the existing identity" {
            create_primary(&db, Some("a@x.com"), Some("123"));

            let view = db.identify(&observe(Some("a@x.com"), Some("456"))).expect("Identify failed");

            assert_eq!(view, IdentityView {
                primary_contact_id: 1,
                emails: vec!["a@x.com".to_string()],
                phone_numbers: vec!["123".to_string(), "456".to_string()],
                secondary_contact_ids: vec![2],
            });

            let created = db.get_contact(2).expect("Query failed").unwrap();
            assert_eq!(created.email, None);
            assert_eq!(created.phone_number.as_deref(), Some("456"));
            assert_eq!(created.linked_id, Some(1));
            assert_eq!(created.link_precedence, LinkPrecedence::Secondary);
        }

        it "demotes the newer of two primaries" {
            create_primary(&db, Some("a@x.com"), Some("123"));
            let newer = create_primary(&db, Some("b@x.com"), Some("456"));

            let view = db.identify(&observe(Some("a@x.com"), Some("456"))).expect("Identify failed");

            assert_eq!(view, IdentityView {
                primary_contact_id: 1,
                emails: vec!["a@x.com".to_string(), "b@x.com".to_string()],
                phone_numbers: vec!["123".to_string(), "456".to_string()],
                secondary_contact_ids: vec![2],
            });

            let demoted = db.get_contact(newer.id).expect("Query failed").unwrap();
            assert_eq!(demoted.link_precedence, LinkPrecedence::Secondary);
            assert_eq!(demoted.linked_id, Some(1));
            assert_eq!(demoted.created_at, newer.created_at);
            assert!(demoted.updated_at >= newer.updated_at);
        }

        it "relinks secondaries of a demoted primary" {
            let older = create_primary(&db, Some("a@x.com"), Some("123"));
            let newer = create_primary(&db, Some("b@x.com"), Some("456"));
            let child = db.create_contact(NewContact::secondary(
                Some("c@x.com".to_string()),
                None,
                newer.id,
            )).expect("Failed to create");

            db.identify(&observe(Some("a@x.com"), Some("456"))).expect("Identify failed");

            let child = db.get_contact(child.id).expect("Query failed").unwrap();
            assert_eq!(child.linked_id, Some(older.id));
        }

        it "creates nothing when the observation is repeated" {
            create_primary(&db, Some("a@x.com"), Some("123"));

            let first = db.identify(&observe(Some("b@x.com"), Some("123"))).expect("Identify failed");
            let second = db.identify(&observe(Some("b@x.com"), Some("123"))).expect("Identify failed");

            assert_eq!(first, second);
            assert!(db.get_contact(3).expect("Query failed").is_none());
        }

        it "starts a new identity when the match was soft-deleted" {
            let old = create_primary(&db, Some("a@x.com"), Some("123"));
            db.soft_delete_contact(old.id).expect("Delete failed");

            let view = db.identify(&observe(Some("a@x.com"), Some("123"))).expect("Identify failed");

            assert_ne!(view.primary_contact_id, old.id);
            assert!(view.secondary_contact_ids.is_empty());
        }
    }

    describe "creation time ties" {
        it "orders equal timestamps by id and keeps the lower id primary" {
            let dir = tempfile::tempdir().expect("Failed to create temp dir");
            let path = dir.path().join("contacts.db");
            let file_db = Database::open(path.clone()).expect("Failed to open");
            file_db.migrate().expect("Failed to migrate");

            let raw = rusqlite::Connection::open(&path).expect("Failed to open raw connection");
            raw.execute_batch(
                "INSERT INTO contacts (id, email, phone_number, link_precedence, created_at, updated_at)
                 VALUES (2, 'b@x.com', '222', 'primary', '2024-06-01T12:00:00.000000Z', '2024-06-01T12:00:00.000000Z');
                 INSERT INTO contacts (id, email, phone_number, link_precedence, created_at, updated_at)
                 VALUES (1, 'a@x.com', '111', 'primary', '2024-06-01T12:00:00.000000Z', '2024-06-01T12:00:00.000000Z');",
            ).expect("Failed to insert");
            drop(raw);

            let found = file_db.find_contacts(&ContactFilter::by_identifiers(
                Some("b@x.com"),
                Some("111"),
            )).expect("Query failed");
            let ids: Vec<i64> = found.iter().map(|c| c.id).collect();
            assert_eq!(ids, vec![1, 2]);

            let view = file_db.identify(&observe(Some("b@x.com"), Some("111"))).expect("Identify failed");
            assert_eq!(view.primary_contact_id, 1);
            assert_eq!(view.secondary_contact_ids, vec![2]);

            let demoted = file_db.get_contact(2).expect("Query failed").unwrap();
            assert_eq!(demoted.linked_id, Some(1));
        }
    }

    describe "open" {
        it "creates the parent directory of a file database" {
            let dir = tempfile::tempdir().expect("Failed to create temp dir");
            let path = dir.path().join("nested").join("contacts.db");

            let file_db = Database::open(path.clone()).expect("Failed to open");
            file_db.migrate().expect("Failed to migrate");
            file_db.identify(&observe(Some("a@x.com"), None)).expect("Identify failed");
            drop(file_db);

            let reopened = Database::open(path).expect("Failed to reopen");
            reopened.migrate().expect("Failed to migrate");
            let contact = reopened.get_contact(1).expect("Query failed");
            assert!(contact.is_some());
        }
    }
}
