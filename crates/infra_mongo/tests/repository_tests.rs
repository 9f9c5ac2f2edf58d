//! Integration Tests for the MongoDB document repository
//!
//! Every test runs against its own database on a shared MongoDB
//! replica-set container, so these tests need docker and are ignored by
//! default. Run them with `cargo test -p infra_mongo -- --ignored`.

use bson::{doc, DateTime as BsonDateTime};
use chrono::{Duration, Utc};
use std::sync::Arc;

use core_kernel::{FixedClock, PageRequest, SortSpec, UpdateDiff};
use infra_mongo::{
    create_client, ping, DbContext, DocumentRepository, MongoConfig, MongoRepository,
    RepositoryError, SharedSession,
};
use test_utils::{
    assert_creation_audit_preserved, assert_ranks, assert_stamped_near, fake_customers, mongo_test,
    Customer, CustomerBuilder, CustomerContact, CustomerFixtures, CustomerId, TemporalFixtures,
    TierCount,
};

fn customers(context: Arc<dyn DbContext>) -> MongoRepository<Customer> {
    MongoRepository::new(context).expect("valid collection name")
}

mod lookups {
    use super::*;

    mongo_test!(test_insert_then_find_by_id_returns_equal_document, |context| {
        let repository = customers(context);
        let customer = CustomerFixtures::ada();

        repository.insert_one(&customer).await.expect("insert failed");
        let found = repository.find_by_id(&customer.id).await.expect("find failed");

        assert_eq!(found, Some(customer));
    });

    mongo_test!(test_find_by_id_for_unknown_id_is_empty, |context| {
        let repository = customers(context);

        let found = repository.find_by_id(&CustomerId::new()).await.expect("find failed");
        assert!(found.is_none());
    });

    mongo_test!(test_find_one_returns_first_match, |context| {
        let repository = customers(context);
        repository
            .insert_many(&[CustomerFixtures::ada(), CustomerFixtures::grace()])
            .await
            .expect("insert failed");

        let found = repository
            .find_one(Some(doc! { "tier": "silver" }))
            .await
            .expect("find failed");
        assert_eq!(found.map(|c| c.name), Some("Grace Hopper".to_string()));

        let missing = repository
            .find_one(Some(doc! { "tier": "platinum" }))
            .await
            .expect("find failed");
        assert!(missing.is_none());
    });

    mongo_test!(test_find_one_projected_reshapes_result, |context| {
        let repository = customers(context);
        let ada = CustomerFixtures::ada();
        repository.insert_one(&ada).await.expect("insert failed");

        let contact: Option<CustomerContact> = repository
            .find_one_projected(
                Some(doc! { "_id": ada.id.as_str() }),
                doc! { "_id": 0, "name": 1, "email": 1 },
            )
            .await
            .expect("find failed");

        assert_eq!(
            contact,
            Some(CustomerContact {
                name: ada.name.clone(),
                email: ada.email.clone(),
            })
        );
    });
}

mod filtering {
    use super::*;

    mongo_test!(test_count_matches_filter_length, |context| {
        let repository = customers(context);
        let mut batch = fake_customers(4);
        batch.push(CustomerBuilder::new().with_tier("gold").build());
        repository.insert_many(&batch).await.expect("insert failed");

        for filter in [None, Some(doc! { "tier": "gold" }), Some(doc! { "rank": { "$gt": 2 } })] {
            let count = repository.count(filter.clone()).await.expect("count failed");
            let matched = repository.filter_by(filter).await.expect("filter failed");
            assert_eq!(count, matched.len() as u64);
        }
    });

    mongo_test!(test_filter_by_without_filter_matches_everything, |context| {
        let repository = customers(context);
        repository
            .insert_many(&CustomerFixtures::ranked(3))
            .await
            .expect("insert failed");

        let all = repository.filter_by(None).await.expect("filter failed");
        assert_eq!(all.len(), 3);
    });

    mongo_test!(test_filter_by_projected_returns_projected_rows, |context| {
        let repository = customers(context);
        repository
            .insert_many(&CustomerFixtures::ranked(3))
            .await
            .expect("insert failed");

        let contacts: Vec<CustomerContact> = repository
            .filter_by_projected(
                Some(doc! { "rank": { "$lte": 2 } }),
                doc! { "_id": 0, "name": 1, "email": 1 },
            )
            .await
            .expect("filter failed");

        assert_eq!(contacts.len(), 2);
        assert!(contacts.iter().all(|c| c.email.is_some()));
    });

    mongo_test!(test_aggregate_groups_by_tier, |context| {
        let repository = customers(context);
        let mut batch = CustomerFixtures::ranked(3);
        batch.push(CustomerFixtures::grace());
        repository.insert_many(&batch).await.expect("insert failed");

        let tiers: Vec<TierCount> = repository
            .aggregate(vec![
                doc! { "$group": { "_id": "$tier", "count": { "$sum": 1 } } },
                doc! { "$sort": { "_id": 1 } },
            ])
            .await
            .expect("aggregate failed");

        assert_eq!(
            tiers,
            vec![
                TierCount { tier: "gold".to_string(), count: 3 },
                TierCount { tier: "silver".to_string(), count: 1 },
            ]
        );
    });
}

mod pagination {
    use super::*;

    async fn seeded(context: Arc<dyn DbContext>) -> MongoRepository<Customer> {
        let repository = customers(context);
        let mut batch = CustomerFixtures::ranked(5);
        batch.reverse();
        repository.insert_many(&batch).await.expect("insert failed");
        repository
    }

    mongo_test!(test_pages_follow_sort_order, |context| {
        let repository = seeded(context).await;
        let by_rank = SortSpec::new().ascending("rank");

        let first = repository
            .paginate(None, &by_rank, PageRequest::new(0, 2))
            .await
            .expect("paginate failed");
        assert_ranks(&first, &[1, 2]);

        let second = repository
            .paginate(None, &by_rank, PageRequest::new(2, 2))
            .await
            .expect("paginate failed");
        assert_ranks(&second, &[3, 4]);

        let wide = repository
            .paginate(None, &by_rank, PageRequest::new(0, 4))
            .await
            .expect("paginate failed");
        assert_ranks(&wide, &[1, 2, 3, 4]);
    });

    mongo_test!(test_page_past_the_end_is_short_or_empty, |context| {
        let repository = seeded(context).await;
        let by_rank = SortSpec::new().ascending("rank");

        let last = repository
            .paginate(None, &by_rank, PageRequest::page(2, 2))
            .await
            .expect("paginate failed");
        assert_ranks(&last, &[5]);

        let beyond = repository
            .paginate(None, &by_rank, PageRequest::new(10, 2))
            .await
            .expect("paginate failed");
        assert!(beyond.is_empty());
    });

    mongo_test!(test_parsed_descending_sort_with_filter, |context| {
        let repository = seeded(context).await;
        let sort: SortSpec = "-rank".parse().expect("valid sort");

        let page = repository
            .paginate(Some(doc! { "rank": { "$lt": 5 } }), &sort, PageRequest::new(1, 2))
            .await
            .expect("paginate failed");
        assert_ranks(&page, &[3, 2]);
    });

    mongo_test!(test_paginate_projected, |context| {
        let repository = seeded(context).await;
        let sort: SortSpec = r#"{"rank": 1}"#.parse().expect("valid sort");

        let contacts: Vec<CustomerContact> = repository
            .paginate_projected(
                None,
                doc! { "_id": 0, "name": 1, "email": 1 },
                &sort,
                PageRequest::new(0, 2),
            )
            .await
            .expect("paginate failed");

        let names: Vec<&str> = contacts.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Customer 01", "Customer 02"]);
    });
}

mod writes {
    use super::*;

    mongo_test!(test_delete_missing_id_leaves_collection_unchanged, |context| {
        let repository = customers(context);
        repository
            .insert_many(&CustomerFixtures::ranked(2))
            .await
            .expect("insert failed");

        let removed = repository
            .delete_by_id(&CustomerId::new())
            .await
            .expect("delete failed");

        assert!(removed.is_none());
        assert_eq!(repository.count(None).await.expect("count failed"), 2);
    });

    mongo_test!(test_delete_returns_removed_document, |context| {
        let repository = customers(context);
        let ada = CustomerFixtures::ada();
        repository.insert_one(&ada).await.expect("insert failed");

        let removed = repository.delete_by_id(&ada.id).await.expect("delete failed");

        assert_eq!(removed, Some(ada.clone()));
        assert!(repository.find_by_id(&ada.id).await.expect("find failed").is_none());
    });

    mongo_test!(test_duplicate_identifier_is_reported_as_driver_error, |context| {
        let repository = customers(context);
        let ada = CustomerFixtures::ada();
        repository.insert_one(&ada).await.expect("insert failed");

        let error = repository.insert_one(&ada).await.unwrap_err();
        assert!(error.is_duplicate_key());
        assert!(error.as_driver().is_some());
    });

    mongo_test!(test_update_never_touches_identity_or_creation_audit, |context| {
        let instant = TemporalFixtures::update_instant();
        let repository = MongoRepository::<Customer>::with_clock(context, Arc::new(FixedClock(instant)))
            .expect("valid collection name");
        let original = CustomerFixtures::ada();
        repository.insert_one(&original).await.expect("insert failed");

        let mut changed = original.clone();
        changed.name = "Augusta Ada King".to_string();
        changed.created_at = BsonDateTime::from_chrono(Utc::now());
        changed.created_by = Some("intruder".to_string());
        changed.modified_at = Some(BsonDateTime::from_millis(0));

        let modified = repository.update_one(&changed).await.expect("update failed");
        assert_eq!(modified, 1);

        let stored = repository
            .find_by_id(&original.id)
            .await
            .expect("find failed")
            .expect("document present");
        assert_eq!(stored.id, original.id);
        assert_eq!(stored.name, "Augusta Ada King");
        assert_creation_audit_preserved(&stored, &original);
        assert_eq!(stored.modified_at, Some(BsonDateTime::from_chrono(instant)));
    });

    mongo_test!(test_update_stamps_call_time_with_system_clock, |context| {
        let repository = customers(context);
        let original = CustomerBuilder::new()
            .modified_at(TemporalFixtures::created_at())
            .build();
        repository.insert_one(&original).await.expect("insert failed");

        let before = Utc::now();
        repository.update_one(&original).await.expect("update failed");

        let stored = repository
            .find_by_id(&original.id)
            .await
            .expect("find failed")
            .expect("document present");
        assert_stamped_near(&stored, before, Duration::seconds(5));
    });

    mongo_test!(test_update_skips_absent_fields, |context| {
        let repository = customers(context);
        let original = CustomerFixtures::ada();
        repository.insert_one(&original).await.expect("insert failed");

        let mut changed = original.clone();
        changed.email = None;
        repository.update_one(&changed).await.expect("update failed");

        let stored = repository
            .find_by_id(&original.id)
            .await
            .expect("find failed")
            .expect("document present");
        assert_eq!(stored.email, original.email);
    });

    mongo_test!(test_update_of_missing_document_does_not_upsert, |context| {
        let repository = customers(context);
        let ghost = CustomerFixtures::grace();

        let modified = repository.update_one(&ghost).await.expect("update failed");

        assert_eq!(modified, 0);
        assert_eq!(repository.count(None).await.expect("count failed"), 0);
    });

    mongo_test!(test_update_fields_sets_and_unsets, |context| {
        let instant = TemporalFixtures::update_instant();
        let repository = MongoRepository::<Customer>::with_clock(context, Arc::new(FixedClock(instant)))
            .expect("valid collection name");
        let original = CustomerFixtures::ada();
        repository.insert_one(&original).await.expect("insert failed");

        let update = UpdateDiff::builder::<Customer>()
            .set("tier", "platinum")
            .unset("email");
        let modified = repository
            .update_fields(&original.id, update)
            .await
            .expect("update failed");
        assert_eq!(modified, 1);

        let stored = repository
            .find_by_id(&original.id)
            .await
            .expect("find failed")
            .expect("document present");
        assert_eq!(stored.tier, "platinum");
        assert!(stored.email.is_none());
        assert_creation_audit_preserved(&stored, &original);
        assert_eq!(stored.modified_at, Some(BsonDateTime::from_chrono(instant)));
    });
}

mod transactions {
    use super::*;

    mongo_test!(test_aborted_writes_are_not_visible, |context| {
        let repository = customers(context.clone());
        let ada = CustomerFixtures::ada();

        context.begin_transaction().await.expect("begin failed");
        repository.insert_one(&ada).await.expect("insert failed");
        let inside = repository.find_by_id(&ada.id).await.expect("find failed");
        assert!(inside.is_some());
        context.abort_transaction().await.expect("abort failed");

        assert!(repository.find_by_id(&ada.id).await.expect("find failed").is_none());
        assert_eq!(repository.count(None).await.expect("count failed"), 0);
    });

    mongo_test!(test_committed_writes_are_visible, |context| {
        let repository = customers(context.clone());
        let batch = CustomerFixtures::ranked(3);

        context.begin_transaction().await.expect("begin failed");
        repository.insert_many(&batch).await.expect("insert failed");
        repository.delete_by_id(&batch[0].id).await.expect("delete failed");
        context.commit_transaction().await.expect("commit failed");

        assert!(!context.has_active_transaction());
        let remaining = repository
            .paginate(None, &SortSpec::new().ascending("rank"), PageRequest::new(0, 10))
            .await
            .expect("paginate failed");
        assert_ranks(&remaining, &[2, 3]);
    });

    mongo_test!(test_uncommitted_writes_are_invisible_outside_the_session, |context| {
        let inner = customers(context.clone());
        let outside = MongoRepository::<Customer>::new(Arc::new(infra_mongo::MongoDbContext::new(
            context.client().clone(),
            context.database().name(),
        )))
        .expect("valid collection name");
        let ada = CustomerFixtures::ada();

        context.begin_transaction().await.expect("begin failed");
        inner.insert_one(&ada).await.expect("insert failed");

        assert!(outside.find_by_id(&ada.id).await.expect("find failed").is_none());

        context.commit_transaction().await.expect("commit failed");
        assert!(outside.find_by_id(&ada.id).await.expect("find failed").is_some());
    });

    mongo_test!(test_every_operation_sees_its_own_uncommitted_writes, |context| {
        let instant = TemporalFixtures::update_instant();
        let repository = MongoRepository::<Customer>::with_clock(context.clone(), Arc::new(FixedClock(instant)))
            .expect("valid collection name");
        let seeded = CustomerFixtures::ranked(2);
        repository.insert_many(&seeded).await.expect("insert failed");

        context.begin_transaction().await.expect("begin failed");

        let newcomer = CustomerBuilder::new().with_tier("silver").with_rank(3).build();
        repository.insert_one(&newcomer).await.expect("insert failed");
        let mut renamed = seeded[0].clone();
        renamed.name = "Renamed Inside".to_string();
        let modified = repository.update_one(&renamed).await.expect("update failed");
        assert_eq!(modified, 1);

        let all = repository.filter_by(None).await.expect("filter failed");
        assert_eq!(all.len(), 3);
        assert!(all.iter().any(|c| c.name == "Renamed Inside"));

        assert_eq!(repository.count(None).await.expect("count failed"), 3);
        assert_eq!(
            repository
                .count(Some(doc! { "tier": "silver" }))
                .await
                .expect("count failed"),
            1
        );

        let by_rank = SortSpec::new().ascending("rank");
        let first = repository
            .paginate(None, &by_rank, PageRequest::new(0, 2))
            .await
            .expect("paginate failed");
        assert_ranks(&first, &[1, 2]);
        assert_eq!(first[0].name, "Renamed Inside");
        assert_eq!(first[0].modified_at, Some(BsonDateTime::from_chrono(instant)));

        let second = repository
            .paginate(None, &by_rank, PageRequest::new(2, 2))
            .await
            .expect("paginate failed");
        assert_ranks(&second, &[3]);

        let tiers: Vec<TierCount> = repository
            .aggregate(vec![
                doc! { "$group": { "_id": "$tier", "count": { "$sum": 1 } } },
                doc! { "$sort": { "_id": 1 } },
            ])
            .await
            .expect("aggregate failed");
        assert_eq!(
            tiers,
            vec![
                TierCount { tier: "gold".to_string(), count: 2 },
                TierCount { tier: "silver".to_string(), count: 1 },
            ]
        );

        context.abort_transaction().await.expect("abort failed");

        assert_eq!(repository.count(None).await.expect("count failed"), 2);
        let restored = repository
            .find_by_id(&seeded[0].id)
            .await
            .expect("find failed")
            .expect("document present");
        assert_eq!(restored, seeded[0]);
    });

    mongo_test!(test_insert_queued_behind_the_session_never_outlives_abort, |context| {
        let repository = customers(context.clone());
        let ada = CustomerFixtures::ada();

        context.begin_transaction().await.expect("begin failed");
        let session = context.current_session().expect("session attached");
        let held = session.lock_owned().await;

        let insert = tokio::spawn({
            let repository = repository.clone();
            let ada = ada.clone();
            async move { repository.insert_one(&ada).await }
        });
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let abort = tokio::spawn({
            let context = context.clone();
            async move { context.abort_transaction().await }
        });
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        drop(held);

        abort.await.expect("abort task").expect("abort failed");
        match insert.await.expect("insert task") {
            Ok(()) | Err(RepositoryError::SessionUnavailable) => {}
            Err(error) => panic!("Unexpected insert failure: {error}"),
        }

        assert!(!context.has_active_transaction());
        assert!(repository.find_by_id(&ada.id).await.expect("find failed").is_none());
    });

    /// Context that still hands out a session after its transaction ended
    struct LaggingContext {
        database: mongodb::Database,
        session: SharedSession,
    }

    impl DbContext for LaggingContext {
        fn database(&self) -> &mongodb::Database {
            &self.database
        }

        fn has_active_transaction(&self) -> bool {
            true
        }

        fn current_session(&self) -> Option<SharedSession> {
            Some(Arc::clone(&self.session))
        }
    }

    mongo_test!(test_write_through_an_aborted_session_handle_is_refused, |context| {
        context.begin_transaction().await.expect("begin failed");
        let stale = context.current_session().expect("session attached");
        context.abort_transaction().await.expect("abort failed");

        let lagging = customers(Arc::new(LaggingContext {
            database: context.database().clone(),
            session: stale,
        }));
        let ada = CustomerFixtures::ada();

        let result = lagging.insert_one(&ada).await;
        assert!(matches!(result, Err(RepositoryError::SessionUnavailable)));

        let repository = customers(context);
        assert_eq!(repository.count(None).await.expect("count failed"), 0);
    });

    mongo_test!(test_second_begin_is_rejected, |context| {
        context.begin_transaction().await.expect("begin failed");

        let result = context.begin_transaction().await;
        assert!(matches!(result, Err(RepositoryError::TransactionAlreadyActive)));

        context.abort_transaction().await.expect("abort failed");
    });
}

mod connectivity {
    use super::*;

    #[tokio::test]
    #[ignore = "requires docker (testcontainers)"]
    async fn test_client_from_config_answers_ping() {
        let harness = test_utils::get_shared_harness().await;
        let config = MongoConfig::new(harness.uri(), "connectivity").app_name("repository-tests");

        let client = create_client(&config).await.expect("client creation failed");
        ping(&client.database(&config.database)).await.expect("ping failed");
    }
}
