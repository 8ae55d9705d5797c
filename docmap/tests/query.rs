mod common;

use common::{
    Anthology, Author, Book, Circle, Hotel, Shape, Square, datastore, datastore_with, options,
};
use docmap::{
    Error, Filters, FindOptions, Pointer, Reference, ReferenceFetch, Sort, filter,
    mongodb::bson::{Bson, doc, oid::ObjectId},
    query::{DeleteOptions, FindAndDeleteOptions, ModifyOptions, UpdateOptions},
    update,
};
use pretty_assertions::assert_eq;

#[test]
fn textual_conditions_match_constructors() {
    let datastore = datastore();

    let mut textual = datastore.find::<Hotel>().unwrap();
    textual.filter_expr("stars >", 3).unwrap();

    let mut constructed = datastore.find::<Hotel>().unwrap();
    constructed.filter(Filters::gt("stars", 3));

    let mut macro_built = datastore.find::<Hotel>().unwrap();
    macro_built.filters(filter! { stars: Gt(3) });

    let expected = doc! {
        "rating": { "$gt": 3 },
        "_t": { "$in": ["Hotel"] },
    };
    assert_eq!(textual.to_document().unwrap(), expected);
    assert_eq!(constructed.to_document().unwrap(), expected);
    assert_eq!(macro_built.to_document().unwrap(), expected);
}

#[test]
fn bare_field_means_equality() {
    let datastore = datastore();
    let mut query = datastore.find::<Hotel>().unwrap();
    query.filter_expr("name", "Grand").unwrap();

    assert_eq!(
        query.to_document().unwrap(),
        doc! { "name": { "$eq": "Grand" }, "_t": { "$in": ["Hotel"] } }
    );
}

#[test]
fn malformed_conditions_are_rejected() {
    let datastore = datastore();
    let mut query = datastore.find::<Hotel>().unwrap();

    for condition in ["", "stars > 3", "stars ~"] {
        assert!(
            matches!(query.filter_expr(condition, 3), Err(Error::MalformedFilter(_))),
            "{condition:?} was accepted"
        );
    }
}

#[test]
fn compiling_twice_gives_the_same_document() {
    let datastore = datastore();
    let mut query = datastore.find::<Hotel>().unwrap();
    query
        .filter(Filters::gte("stars", 3))
        .filter(Filters::lte("stars", 5))
        .filter(Filters::eq("tags", "spa"));

    let first = query.to_document().unwrap();
    assert_eq!(
        first,
        doc! {
            "rating": { "$gte": 3, "$lte": 5 },
            "tags": { "$eq": "spa" },
            "_t": { "$in": ["Hotel"] },
        }
    );
    assert_eq!(query.to_document().unwrap(), first);
}

#[test]
fn nested_paths_and_logical_operators() {
    let datastore = datastore();
    let mut query = datastore.find::<Hotel>().unwrap();
    query
        .filter(Filters::or(vec![
            Filters::eq("address.city", "Lisbon"),
            Filters::lt("stars", 2),
        ]))
        .filter(Filters::in_("stars", [3, 4]).not());

    assert_eq!(
        query.to_document().unwrap(),
        doc! {
            "$or": [
                { "address.city": { "$eq": "Lisbon" } },
                { "rating": { "$lt": 2 } },
            ],
            "rating": { "$not": { "$in": [3, 4] } },
            "_t": { "$in": ["Hotel"] },
        }
    );
}

#[test]
fn unknown_paths_fail_unless_validation_is_off() {
    let datastore = datastore();

    let mut validated = datastore.find::<Hotel>().unwrap();
    validated.filter(Filters::eq("address.zip", "1100"));
    assert!(matches!(
        validated.to_document(),
        Err(Error::Validation { path, .. }) if path == "address.zip"
    ));

    let mut unvalidated = datastore.find::<Hotel>().unwrap();
    unvalidated
        .disable_validation()
        .filter(Filters::eq("address.zip", "1100"));
    assert_eq!(
        unvalidated.to_document().unwrap(),
        doc! { "address.zip": { "$eq": "1100" }, "_t": { "$in": ["Hotel"] } }
    );
}

#[test]
#[allow(deprecated)]
fn legacy_operations_are_refused() {
    let datastore = datastore();
    let mut query = datastore.find::<Hotel>().unwrap();

    assert!(query.limit(3).unwrap_err().is_legacy_operation());
    assert!(query.offset(3).unwrap_err().is_legacy_operation());
    assert!(query.order("-stars").unwrap_err().is_legacy_operation());
    assert!(query.retrieved_fields(true, &["name"]).unwrap_err().is_legacy_operation());
}

#[test]
fn discriminators_restrict_queries() {
    let plain = datastore();
    assert_eq!(plain.find::<Shape>().unwrap().to_document().unwrap(), doc! {});
    assert_eq!(
        plain.find::<Circle>().unwrap().to_document().unwrap(),
        doc! { "_t": { "$in": ["Circle"] } }
    );

    let polymorphic = datastore_with(options().enable_polymorphic_queries(true));
    assert_eq!(
        polymorphic.find::<Shape>().unwrap().to_document().unwrap(),
        doc! { "_t": { "$in": ["Circle", "Square"] } }
    );

    let id = ObjectId::new();
    let mut by_id = polymorphic.find::<Square>().unwrap();
    by_id.filter(Filters::eq("id", id));
    assert_eq!(by_id.to_document().unwrap(), doc! { "_id": { "$eq": id } });
}

#[tokio::test]
async fn saved_entities_can_be_found_and_deleted() {
    let datastore = datastore();

    let id = match datastore.save(&Hotel::grand()).await.unwrap() {
        Bson::ObjectId(id) => id,
        other => panic!("expected a generated object id, got {other}"),
    };

    let mut query = datastore.find::<Hotel>().unwrap();
    query.filter(Filters::eq("id", id));

    let found = query.first(FindOptions::default()).await.unwrap().unwrap();
    assert_eq!(
        found,
        Hotel {
            id: Some(id),
            ..Hotel::grand()
        }
    );

    assert_eq!(datastore.find::<Hotel>().unwrap().count(Default::default()).await.unwrap(), 1);

    let deleted = datastore.delete(&found).await.unwrap();
    assert_eq!(deleted.deleted_count, 1);
    assert!(datastore.store().documents("hotels").is_empty());
}

#[tokio::test]
async fn query_deletes_honour_multi() {
    let datastore = datastore();
    for _ in 0..3 {
        datastore.save(&Hotel::grand()).await.unwrap();
    }

    let query = datastore.find::<Hotel>().unwrap();
    assert_eq!(query.delete(DeleteOptions::default()).await.unwrap().deleted_count, 1);
    assert_eq!(query.delete(DeleteOptions::multi()).await.unwrap().deleted_count, 2);
}

#[tokio::test]
async fn find_and_delete_returns_the_removed_entity() {
    let datastore = datastore();
    datastore.save(&Hotel::grand()).await.unwrap();

    let removed = datastore
        .find::<Hotel>()
        .unwrap()
        .find_and_delete(FindAndDeleteOptions::default())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(removed.name, "Grand");
    assert!(datastore.store().documents("hotels").is_empty());
}

#[tokio::test]
async fn updates_are_grouped_by_operator() {
    let datastore = datastore();
    let mut query = datastore.find::<Hotel>().unwrap();
    query.filter(Filters::eq("name", "Grand"));
    query
        .update(update! {
            stars: Inc(1),
            tags: Push("renovated"),
            name: "Grander",
            address: Unset,
        })
        .execute(UpdateOptions::default().multi(true))
        .await
        .unwrap();

    let call = datastore.store().last_call();
    assert_eq!(call.operation, "update");
    assert_eq!(call.collection, "hotels");
    assert_eq!(
        call.body,
        doc! {
            "filter": { "name": { "$eq": "Grand" }, "_t": { "$in": ["Hotel"] } },
            "update": {
                "$inc": { "rating": 1 },
                "$push": { "tags": "renovated" },
                "$set": { "name": "Grander" },
                "$unset": { "address": "" },
            },
        }
    );
}

#[tokio::test]
async fn invalid_updates_are_rejected() {
    let datastore = datastore();
    let query = datastore.find::<Hotel>().unwrap();

    let empty = query.update(Vec::new()).execute(UpdateOptions::default()).await;
    assert!(matches!(empty, Err(Error::InvalidUpdate(_))));

    let unknown = query
        .update(update! { rooms: Inc(1) })
        .execute(UpdateOptions::default())
        .await;
    assert!(matches!(unknown, Err(Error::Validation { path, .. }) if path == "rooms"));
    assert!(datastore.store().calls().is_empty());
}

#[tokio::test]
async fn modify_returns_the_matching_entity() {
    let datastore = datastore();
    datastore.save(&Hotel::grand()).await.unwrap();

    let modified = datastore
        .find::<Hotel>()
        .unwrap()
        .modify(vec![docmap::Updates::set("stars", 5)])
        .execute(ModifyOptions::default().return_new(true))
        .await
        .unwrap();

    assert_eq!(modified.map(|hotel| hotel.name), Some("Grand".to_owned()));
    assert_eq!(
        datastore.store().last_call().body.get_document("update").unwrap(),
        &doc! { "$set": { "rating": 5 } }
    );
}

#[tokio::test]
async fn keys_point_at_matching_documents() {
    let datastore = datastore();
    let id = datastore.save(&Hotel::grand()).await.unwrap();

    let keys = datastore
        .find::<Hotel>()
        .unwrap()
        .keys(FindOptions::default())
        .await
        .unwrap();

    assert_eq!(keys, vec![Pointer::new("hotels", id)]);
}

#[tokio::test]
async fn explain_and_profiling_run_commands() {
    let datastore = datastore();
    let query = datastore.find::<Hotel>().unwrap();

    query
        .explain(FindOptions::new().sort(Sort::new().descending("stars")).limit(5))
        .await
        .unwrap();
    assert_eq!(
        datastore.store().last_call().body,
        doc! {
            "explain": {
                "find": "hotels",
                "filter": { "_t": { "$in": ["Hotel"] } },
                "sort": { "rating": -1 },
                "limit": 5_i64,
            }
        }
    );

    query.to_vec(FindOptions::new().log_query(true)).await.unwrap();
    let commands = datastore
        .store()
        .calls()
        .into_iter()
        .filter(|call| call.operation == "run_command")
        .map(|call| call.body)
        .collect::<Vec<_>>();
    assert_eq!(
        commands[1..],
        [
            doc! { "profile": 2, "slowms": 0 },
            doc! { "profile": 0, "slowms": 100 },
        ]
    );
}

#[tokio::test]
async fn profiling_is_restored_when_the_query_fails() {
    let datastore = datastore();
    let query = datastore.find::<Book>().unwrap();

    let result = query
        .to_vec(FindOptions::new().log_query(true).sort(doc! { "title": "up" }))
        .await;
    assert!(matches!(result, Err(Error::UnsupportedShape(_))));

    let commands = datastore
        .store()
        .calls()
        .into_iter()
        .filter(|call| call.operation == "run_command")
        .map(|call| call.body)
        .collect::<Vec<_>>();
    assert_eq!(
        commands,
        [
            doc! { "profile": 2, "slowms": 0 },
            doc! { "profile": 0, "slowms": 100 },
        ]
    );
}

#[tokio::test]
async fn text_score_sorts_skip_path_validation() {
    let datastore = datastore();

    let mut hotels = datastore.find::<Hotel>().unwrap();
    hotels.search("spa");
    hotels
        .to_vec(FindOptions::new().sort(Sort::new().text_score("score").descending("stars")))
        .await
        .unwrap();
    assert_eq!(
        datastore.store().last_call().body,
        doc! { "$text": { "$search": "spa" }, "_t": { "$in": ["Hotel"] } }
    );
    assert_eq!(
        datastore.store().last_sort(),
        Some(doc! { "score": { "$meta": "textScore" }, "rating": -1 })
    );

    let mut books = datastore.find::<Book>().unwrap();
    books.search("tides");
    books
        .to_vec(FindOptions::new().sort(Sort::new().text_score("score")))
        .await
        .unwrap();
    assert_eq!(
        datastore.store().last_call().body,
        doc! {
            "pipeline": [
                { "$match": { "$text": { "$search": "tides" }, "_t": { "$in": ["Book"] } } },
                {
                    "$lookup": {
                        "from": "authors",
                        "localField": "author.$id",
                        "foreignField": "_id",
                        "as": "author",
                    }
                },
                { "$sort": { "score": { "$meta": "textScore" } } },
            ]
        }
    );
}

#[test]
fn queries_display_as_shell_commands() {
    let datastore = datastore();
    let mut query = datastore.find::<Hotel>().unwrap();
    query.filter(Filters::gt("stars", 3));

    assert_eq!(
        query.to_string(),
        format!("hotels.find({})", doc! { "rating": { "$gt": 3 }, "_t": { "$in": ["Hotel"] } })
    );
}

fn ann() -> Author {
    Author {
        id: ObjectId::new(),
        name: "Ann".to_owned(),
    }
}

#[tokio::test]
async fn eager_references_are_joined_with_lookup() {
    let datastore = datastore();
    let author = ann();
    let book_id = ObjectId::new();

    datastore.store().queue_aggregate([doc! {
        "_id": book_id,
        "_t": "Book",
        "title": "Tides",
        "author": [{ "_id": author.id, "_t": "Author", "name": "Ann" }],
    }]);

    let books = datastore
        .find::<Book>()
        .unwrap()
        .to_vec(FindOptions::new().sort(Sort::new().ascending("title")).limit(10))
        .await
        .unwrap();

    let call = datastore.store().last_call();
    assert_eq!(call.operation, "aggregate");
    assert_eq!(
        call.body,
        doc! {
            "pipeline": [
                { "$match": { "_t": { "$in": ["Book"] } } },
                {
                    "$lookup": {
                        "from": "authors",
                        "localField": "author.$id",
                        "foreignField": "_id",
                        "as": "author",
                    }
                },
                { "$sort": { "title": 1 } },
                { "$limit": 10_i64 },
            ]
        }
    );

    assert_eq!(books.len(), 1);
    assert_eq!(books[0].author.get(), Some(&author));
    assert_eq!(books[0].sequel, None);
}

#[tokio::test]
async fn eager_references_can_use_a_secondary_query() {
    let datastore = datastore_with(options().reference_fetch(ReferenceFetch::SecondaryQuery));
    let author = ann();

    datastore.save(&author).await.unwrap();
    datastore
        .save(&Book {
            id: ObjectId::new(),
            title: "Tides".to_owned(),
            author: Reference::to(author.clone()),
            sequel: None,
        })
        .await
        .unwrap();

    let stored = datastore.store().documents("books");
    assert_eq!(
        stored[0].get_document("author").unwrap(),
        &doc! { "$ref": "authors", "$id": author.id }
    );

    let books = datastore
        .find::<Book>()
        .unwrap()
        .to_vec(FindOptions::default())
        .await
        .unwrap();
    assert_eq!(books[0].author.get(), Some(&author));

    let calls = datastore.store().calls();
    let lookup = calls.last().unwrap();
    assert_eq!(lookup.collection, "authors");
    assert_eq!(lookup.body, doc! { "_id": { "$in": [author.id] } });
}

#[tokio::test]
async fn lazy_references_load_on_fetch() {
    let datastore = datastore_with(options().reference_fetch(ReferenceFetch::SecondaryQuery));
    let author = ann();
    datastore.save(&author).await.unwrap();

    let first_id = ObjectId::new();
    let second = Book {
        id: ObjectId::new(),
        title: "Second".to_owned(),
        author: Reference::to(author.clone()),
        sequel: Some(Reference::pointer(Pointer::new("books", first_id))),
    };
    let first = Book {
        id: first_id,
        title: "First".to_owned(),
        author: Reference::to(author.clone()),
        sequel: Some(Reference::to(second.clone())),
    };
    datastore.save(&first).await.unwrap();
    datastore.save(&second).await.unwrap();

    let mut query = datastore.find::<Book>().unwrap();
    query.filter(Filters::eq("id", first_id));
    let mut loaded = query.first(FindOptions::default()).await.unwrap().unwrap();

    let sequel = loaded.sequel.as_mut().unwrap();
    assert_eq!(sequel.as_pointer(), Some(&Pointer::new("books", second.id)));

    let fetched = sequel.fetch(&datastore).await.unwrap().unwrap();
    assert_eq!(fetched.title, "Second");
    // The cycle closes back on the first book without loading it again.
    assert_eq!(
        fetched.sequel.as_ref().and_then(Reference::as_pointer),
        Some(&Pointer::new("books", first_id))
    );
}

#[tokio::test]
async fn bare_pointers_take_the_target_collection() {
    let datastore = datastore();
    let author = ann();

    let book = Book {
        id: ObjectId::new(),
        title: "Orphan".to_owned(),
        author: Reference::pointer(Pointer::id_only(author.id)),
        sequel: None,
    };

    // A bare pointer is completed with the target's collection.
    datastore.save(&book).await.unwrap();
    assert_eq!(
        datastore.store().documents("books")[0].get_document("author").unwrap(),
        &doc! { "$ref": "authors", "$id": author.id }
    );
}

fn authors() -> [Author; 3] {
    ["Ann", "Bo", "Cy"].map(|name| Author {
        id: ObjectId::new(),
        name: name.to_owned(),
    })
}

#[tokio::test]
async fn reference_sequences_are_joined_in_stored_order() {
    let datastore = datastore();
    let [ann, bo, cy] = authors();
    let anthology_id = ObjectId::new();

    // `$lookup` hands back the joined documents in the foreign collection's
    // order, without the dangling `cy` and without repeats.
    datastore.store().queue_aggregate([doc! {
        "_id": anthology_id,
        "_t": "Anthology",
        "title": "Voices",
        "authors": [
            { "_id": bo.id, "_t": "Author", "name": "Bo" },
            { "_id": ann.id, "_t": "Author", "name": "Ann" },
        ],
    }]);

    let anthologies = datastore
        .find::<Anthology>()
        .unwrap()
        .to_vec(FindOptions::default())
        .await
        .unwrap();

    assert_eq!(
        datastore.store().last_call().body,
        doc! {
            "pipeline": [
                { "$match": { "_t": { "$in": ["Anthology"] } } },
                {
                    "$lookup": {
                        "from": "authors",
                        "localField": "authors.$id",
                        "foreignField": "_id",
                        "as": "authors",
                    }
                },
            ]
        }
    );

    let loaded = anthologies[0]
        .authors
        .iter()
        .map(|author| author.get().unwrap().name.as_str())
        .collect::<Vec<_>>();
    assert_eq!(loaded, ["Bo", "Ann"]);
    assert!(!loaded.contains(&cy.name.as_str()));
}

#[tokio::test]
async fn reference_sequences_keep_order_with_a_secondary_query() {
    let datastore = datastore_with(options().reference_fetch(ReferenceFetch::SecondaryQuery));
    let [ann, bo, cy] = authors();
    datastore.save(&ann).await.unwrap();
    datastore.save(&bo).await.unwrap();

    datastore
        .save(&Anthology {
            id: ObjectId::new(),
            title: "Voices".to_owned(),
            authors: vec![
                Reference::to(bo.clone()),
                Reference::to(ann.clone()),
                Reference::pointer(Pointer::new("authors", cy.id)),
                Reference::to(bo.clone()),
            ],
        })
        .await
        .unwrap();

    let anthology = datastore
        .find::<Anthology>()
        .unwrap()
        .first(FindOptions::default())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(
        datastore.store().last_call().body,
        doc! { "_id": { "$in": [bo.id, ann.id, cy.id] } }
    );

    // Stored order and repeats survive; a missing target stays a pointer.
    let [first, second, third, fourth] = &anthology.authors[..] else {
        panic!("expected four authors, got {:?}", anthology.authors);
    };
    assert_eq!(first.get(), Some(&bo));
    assert_eq!(second.get(), Some(&ann));
    assert_eq!(third.as_pointer(), Some(&Pointer::new("authors", cy.id)));
    assert_eq!(fourth.get(), Some(&bo));
}
