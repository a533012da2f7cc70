use rocket::Route;

pub mod relay;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(relay::routes());
    routes
}
