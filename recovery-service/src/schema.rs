diesel::table! {
    checkouts (checkout_id) {
        checkout_id -> Varchar,
        store_id -> Varchar,
        cart_url -> Text,
        status -> Varchar,
        created_at -> Timestamptz,
        check_after -> Timestamptz,
        processed_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    stores (store_id) {
        store_id -> Varchar,
        access_token -> Text,
        created_at -> Timestamptz,
    }
}

diesel::allow_tables_to_appear_in_same_query!(
    checkouts,
    stores,
);
