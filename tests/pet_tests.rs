// tests/pet_tests.rs

mod common;

use common::{PNG_BYTES, TestApp, spawn_app};
use reqwest::multipart::{Form, Part};
use serde_json::Value;

#[tokio::test]
async fn created_post_round_trips() {
    // Arrange
    let app = spawn_app().await;
    let (token, user_id) = app.register("rexowner").await;

    // Act
    let created = app
        .create_post(&token, "Rex", "Good boy", "Dog", "Labrador", 2)
        .await;
    let id = created["id"].as_i64().unwrap();
    let (status, post) = app.get_json(&format!("/pets/{}", id)).await;

    // Assert
    assert_eq!(status, 200);
    assert_eq!(post["title"], "Rex");
    assert_eq!(post["content"], "Good boy");
    assert_eq!(post["species"], "Dog");
    assert_eq!(post["breed"], "Labrador");
    assert_eq!(post["imageUrls"].as_array().unwrap().len(), 2);
    assert_eq!(post["user"]["id"], user_id);
    assert_eq!(post["user"]["username"], "rexowner");
    assert_eq!(post["user"]["bio"], "");
    assert!(post["user"].get("password").is_none());
    assert!(post["user"].get("email").is_none());
    assert_eq!(post["likes"], serde_json::json!([]));
    assert_eq!(post["comments"], serde_json::json!([]));

    // Stored images are served back.
    let image_url = post["imageUrls"][0].as_str().unwrap();
    let image = app.client.get(image_url).send().await.unwrap();
    assert_eq!(image.status().as_u16(), 200);
    assert_eq!(image.bytes().await.unwrap().as_ref(), PNG_BYTES);
}

#[tokio::test]
async fn owner_comes_from_the_credential() {
    let app = spawn_app().await;
    let (token, user_id) = app.register("honest").await;
    let (_, other_id) = app.register("victim").await;

    let form = TestApp::post_form("Rex", "Good boy", "Dog", "Labrador", 0)
        .text("user", other_id.to_string())
        .text("user_id", other_id.to_string());
    let response = app
        .client
        .post(app.url("/pets"))
        .bearer_auth(&token)
        .multipart(form)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 201);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["user"]["id"], user_id);
}

#[tokio::test]
async fn create_post_requires_every_field() {
    let app = spawn_app().await;
    let (token, _) = app.register("forgetful").await;

    let form = Form::new()
        .text("title", "Rex")
        .text("content", "Good boy")
        .text("species", "Dog");
    let response = app
        .client
        .post(app.url("/pets"))
        .bearer_auth(&token)
        .multipart(form)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 400);
    let body: Value = response.json().await.unwrap();
    assert!(body["message"].as_str().unwrap().to_lowercase().contains("breed"));
}

#[tokio::test]
async fn create_post_rejects_unsupported_images() {
    let app = spawn_app().await;
    let (token, _) = app.register("gifposter").await;

    let form = TestApp::post_form("Rex", "Good boy", "Dog", "Labrador", 0).part(
        "images",
        Part::bytes(b"GIF89a".to_vec())
            .file_name("anim.gif")
            .mime_str("image/gif")
            .unwrap(),
    );
    let response = app
        .client
        .post(app.url("/pets"))
        .bearer_auth(&token)
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);

    let too_many = app
        .client
        .post(app.url("/pets"))
        .bearer_auth(&token)
        .multipart(TestApp::post_form("Rex", "Good boy", "Dog", "Labrador", 6))
        .send()
        .await
        .unwrap();
    assert_eq!(too_many.status().as_u16(), 400);

    let (_, posts) = app.get_json("/pets").await;
    assert_eq!(posts.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn unknown_post_is_404() {
    let app = spawn_app().await;

    let (status, body) = app.get_json("/pets/9999").await;

    assert_eq!(status, 404);
    assert_eq!(body["message"], "Post not found");
}

#[tokio::test]
async fn only_the_owner_can_edit() {
    let app = spawn_app().await;
    let (owner, _) = app.register("owner").await;
    let (stranger, _) = app.register("stranger").await;
    let id = app
        .create_post(&owner, "Rex", "Good boy", "Dog", "Labrador", 0)
        .await["id"]
        .as_i64()
        .unwrap();

    let forbidden = app
        .client
        .put(app.url(&format!("/pets/{}", id)))
        .bearer_auth(&stranger)
        .json(&serde_json::json!({"title": "Mine now"}))
        .send()
        .await
        .unwrap();
    assert_eq!(forbidden.status().as_u16(), 403);

    let updated = app
        .client
        .put(app.url(&format!("/pets/{}", id)))
        .bearer_auth(&owner)
        .json(&serde_json::json!({"title": "Rex the Second"}))
        .send()
        .await
        .unwrap();
    assert_eq!(updated.status().as_u16(), 200);
    let body: Value = updated.json().await.unwrap();
    assert_eq!(body["title"], "Rex the Second");
    assert_eq!(body["content"], "Good boy");
    assert_eq!(body["breed"], "Labrador");
    assert!(body["updatedAt"].is_string());

    let blank = app
        .client
        .put(app.url(&format!("/pets/{}", id)))
        .bearer_auth(&owner)
        .json(&serde_json::json!({"species": ""}))
        .send()
        .await
        .unwrap();
    assert_eq!(blank.status().as_u16(), 400);
}

#[tokio::test]
async fn only_the_owner_can_delete_and_images_go_with_the_post() {
    let app = spawn_app().await;
    let (owner, _) = app.register("owner").await;
    let (stranger, _) = app.register("stranger").await;
    let created = app
        .create_post(&owner, "Rex", "Good boy", "Dog", "Labrador", 2)
        .await;
    let id = created["id"].as_i64().unwrap();
    let files: Vec<_> = created["imageUrls"]
        .as_array()
        .unwrap()
        .iter()
        .map(|url| app.blob_path(url.as_str().unwrap()))
        .collect();
    assert!(files.iter().all(|f| f.exists()));

    let forbidden = app
        .client
        .delete(app.url(&format!("/pets/{}", id)))
        .bearer_auth(&stranger)
        .send()
        .await
        .unwrap();
    assert_eq!(forbidden.status().as_u16(), 403);
    assert_eq!(app.get_json(&format!("/pets/{}", id)).await.0, 200);

    let deleted = app
        .client
        .delete(app.url(&format!("/pets/{}", id)))
        .bearer_auth(&owner)
        .send()
        .await
        .unwrap();
    assert_eq!(deleted.status().as_u16(), 200);
    let body: Value = deleted.json().await.unwrap();
    assert_eq!(body["failedImages"], serde_json::json!([]));

    assert_eq!(app.get_json(&format!("/pets/{}", id)).await.0, 404);
    assert!(files.iter().all(|f| !f.exists()));
}

#[tokio::test]
async fn like_is_a_set() {
    let app = spawn_app().await;
    let (owner, _) = app.register("owner").await;
    let (fan, fan_id) = app.register("fan").await;
    let id = app
        .create_post(&owner, "Rex", "Good boy", "Dog", "Labrador", 0)
        .await["id"]
        .as_i64()
        .unwrap();
    let like_url = app.url(&format!("/pets/{}/like", id));
    let unlike_url = app.url(&format!("/pets/{}/unlike", id));

    let first = app.client.put(&like_url).bearer_auth(&fan).send().await.unwrap();
    assert_eq!(first.status().as_u16(), 200);
    let body: Value = first.json().await.unwrap();
    assert_eq!(body["likes"], serde_json::json!([fan_id]));

    let second = app.client.put(&like_url).bearer_auth(&fan).send().await.unwrap();
    assert_eq!(second.status().as_u16(), 400);
    let body: Value = second.json().await.unwrap();
    assert_eq!(body["message"], "Post already liked");

    // Anyone may like, the owner included.
    let own = app.client.put(&like_url).bearer_auth(&owner).send().await.unwrap();
    assert_eq!(own.status().as_u16(), 200);

    let unlike = app.client.put(&unlike_url).bearer_auth(&fan).send().await.unwrap();
    assert_eq!(unlike.status().as_u16(), 200);
    let body: Value = unlike.json().await.unwrap();
    assert_eq!(body["likes"].as_array().unwrap().len(), 1);
    assert!(!body["likes"].as_array().unwrap().contains(&Value::from(fan_id)));

    let again = app.client.put(&unlike_url).bearer_auth(&fan).send().await.unwrap();
    assert_eq!(again.status().as_u16(), 400);

    let anonymous = app.client.put(&like_url).send().await.unwrap();
    assert_eq!(anonymous.status().as_u16(), 401);

    let missing = app
        .client
        .put(app.url("/pets/9999/like"))
        .bearer_auth(&fan)
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status().as_u16(), 404);
}

#[tokio::test]
async fn search_matches_title_or_content_case_insensitively() {
    let app = spawn_app().await;
    let (token, _) = app.register("poster").await;
    app.create_post(&token, "Fluffy the cat", "Sleeps all day", "Cat", "Persian", 0)
        .await;
    app.create_post(&token, "Rex the dog", "Good boy", "Dog", "Labrador", 0)
        .await;
    app.create_post(&token, "Nibbles", "A very fluffy rabbit", "Rabbit", "Angora", 0)
        .await;

    let (status, both) = app.get_json("/pets/search?query=the").await;
    assert_eq!(status, 200);
    assert_eq!(both["count"], 2);

    let (_, one) = app.get_json("/pets/search?query=Fluffy%20the").await;
    assert_eq!(one["count"], 1);
    assert_eq!(one["posts"][0]["title"], "Fluffy the cat");

    let (_, by_content) = app.get_json("/pets/search?query=FLUFFY").await;
    assert_eq!(by_content["count"], 2);

    let (_, literal) = app.get_json("/pets/search?query=%25").await;
    assert_eq!(literal["count"], 0);

    let (status, _) = app.get_json("/pets/search?query=").await;
    assert_eq!(status, 400);
}

#[tokio::test]
async fn filter_is_an_exact_conjunction() {
    let app = spawn_app().await;
    let (token, _) = app.register("poster").await;
    app.create_post(&token, "Rex", "Good boy", "Dog", "Labrador", 0).await;
    app.create_post(&token, "Max", "Also good", "Dog", "Beagle", 0).await;
    app.create_post(&token, "Tom", "Cat things", "Cat", "Siamese", 0).await;

    let (_, dogs) = app.get_json("/pets/filter?species=Dog").await;
    assert_eq!(dogs["count"], 2);
    assert!(dogs["posts"]
        .as_array()
        .unwrap()
        .iter()
        .all(|p| p["species"] == "Dog"));

    let (_, beagles) = app.get_json("/pets/filter?species=Dog&breed=Beagle").await;
    assert_eq!(beagles["count"], 1);
    assert_eq!(beagles["posts"][0]["title"], "Max");

    let (_, partial) = app.get_json("/pets/filter?species=Do").await;
    assert_eq!(partial["count"], 0);

    let (_, everything) = app.get_json("/pets/filter").await;
    assert_eq!(everything["count"], 3);
}

#[tokio::test]
async fn listing_sorts_and_filters() {
    let app = spawn_app().await;
    let (token, _) = app.register("poster").await;
    let (fan, _) = app.register("fan").await;
    app.create_post(&token, "First", "one", "Dog", "Labrador", 0).await;
    let second = app.create_post(&token, "Second", "two", "Cat", "Persian", 0).await;
    app.create_post(&token, "Third", "three", "Dog", "Beagle", 0).await;

    let (_, newest) = app.get_json("/pets").await;
    let titles: Vec<_> = newest
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["title"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(titles, ["Third", "Second", "First"]);

    let (_, oldest) = app.get_json("/pets?sort=oldest").await;
    assert_eq!(oldest[0]["title"], "First");

    app.client
        .put(app.url(&format!("/pets/{}/like", second["id"])))
        .bearer_auth(&fan)
        .send()
        .await
        .unwrap();
    let (_, popular) = app.get_json("/pets?sort=popular").await;
    assert_eq!(popular[0]["title"], "Second");
    assert_eq!(popular[0]["user"]["username"], "poster");

    let (_, dogs) = app.get_json("/pets?species=Dog&search=thr").await;
    assert_eq!(dogs.as_array().unwrap().len(), 1);
    assert_eq!(dogs[0]["title"], "Third");

    let (status, _) = app.get_json("/pets?sort=random").await;
    assert_eq!(status, 400);
}

#[tokio::test]
async fn single_image_can_be_removed() {
    let app = spawn_app().await;
    let (owner, _) = app.register("owner").await;
    let (stranger, _) = app.register("stranger").await;
    let created = app
        .create_post(&owner, "Rex", "Good boy", "Dog", "Labrador", 2)
        .await;
    let id = created["id"].as_i64().unwrap();
    let first = created["imageUrls"][0].as_str().unwrap().to_string();
    let second = created["imageUrls"][1].as_str().unwrap().to_string();
    let images_url = app.url(&format!("/pets/{}/images", id));

    let forbidden = app
        .client
        .delete(&images_url)
        .bearer_auth(&stranger)
        .json(&serde_json::json!({"imageUrl": first}))
        .send()
        .await
        .unwrap();
    assert_eq!(forbidden.status().as_u16(), 403);

    let unknown = app
        .client
        .delete(&images_url)
        .bearer_auth(&owner)
        .json(&serde_json::json!({"imageUrl": "http://elsewhere/x.png"}))
        .send()
        .await
        .unwrap();
    assert_eq!(unknown.status().as_u16(), 404);

    let removed = app
        .client
        .delete(&images_url)
        .bearer_auth(&owner)
        .json(&serde_json::json!({"imageUrl": first}))
        .send()
        .await
        .unwrap();
    assert_eq!(removed.status().as_u16(), 200);
    let body: Value = removed.json().await.unwrap();
    assert_eq!(body["imageUrls"], serde_json::json!([second]));
    assert!(!app.blob_path(&first).exists());
    assert!(app.blob_path(&second).exists());
}

#[tokio::test]
async fn special_characters_round_trip_and_stay_searchable() {
    let app = spawn_app().await;
    let (token, _) = app.register("punctual").await;

    let created = app
        .create_post(&token, "Cats & Dogs", "a < b", "Cat", "Mixed", 0)
        .await;
    let (_, post) = app.get_json(&format!("/pets/{}", created["id"])).await;

    assert_eq!(post["title"], "Cats & Dogs");
    assert_eq!(post["content"], "a < b");

    let (_, found) = app.get_json("/pets/search?query=Cats%20%26%20Dogs").await;
    assert_eq!(found["count"], 1);

    let (_, found) = app.get_json("/pets/search?query=%3C%20b").await;
    assert_eq!(found["count"], 1);
}

#[tokio::test]
async fn search_folds_non_ascii_case() {
    let app = spawn_app().await;
    let (token, _) = app.register("umlaut").await;
    let id = app
        .create_post(&token, "Ärger the cat", "Sleeps all day", "Cat", "Tabby", 0)
        .await["id"]
        .as_i64()
        .unwrap();
    app.create_post(&token, "Rex", "Good boy", "Dog", "Pug", 0).await;

    let (_, lower) = app.get_json("/pets/search?query=%C3%A4rger").await;
    assert_eq!(lower["count"], 1);
    assert_eq!(lower["posts"][0]["id"], id);

    let (_, upper) = app.get_json("/pets/search?query=%C3%84RGER").await;
    assert_eq!(upper["count"], 1);

    // Edited titles are searchable under their new text only.
    let response = app
        .client
        .put(app.url(&format!("/pets/{}", id)))
        .bearer_auth(&token)
        .json(&serde_json::json!({ "title": "Öskar" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let (_, renamed) = app.get_json("/pets/search?query=%C3%B6skar").await;
    assert_eq!(renamed["count"], 1);
    let (_, old) = app.get_json("/pets/search?query=%C3%A4rger").await;
    assert_eq!(old["count"], 0);
}
