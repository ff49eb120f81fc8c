use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::models::{
    AppointmentRecord, AppointmentStatus, ComplaintRecord, Provider, ReviewRecord,
};

/// Realistic sample marketplace activity shared by `seed` and `serve --memory`.
pub struct DemoDataset {
    pub providers: Vec<Provider>,
    pub appointments: Vec<AppointmentRecord>,
    pub reviews: Vec<ReviewRecord>,
    pub complaints: Vec<ComplaintRecord>,
}

struct ProviderProfile {
    id: &'static str,
    owner: &'static str,
    name: &'static str,
    email: &'static str,
    category: &'static str,
    appointments: i64,
    completed: i64,
    response_hours: i64,
    ratings: &'static [i32],
    complaints: i64,
}

const PROFILES: [ProviderProfile; 3] = [
    ProviderProfile {
        id: "6b1c4c1e-6a3f-4f0e-9a55-2f4b8d6d1a01",
        owner: "f2a9e1b4-3c6d-4a8e-b1f0-7d2c5e9a4b11",
        name: "Harbor Family Clinic",
        email: "frontdesk@harborfamilyclinic.com",
        category: "clinic",
        appointments: 20,
        completed: 19,
        response_hours: 1,
        ratings: &[5, 5, 5, 4, 5, 5],
        complaints: 0,
    },
    ProviderProfile {
        id: "9d7e2b40-1f5a-4c3b-8e62-0a4f6c8b2d02",
        owner: "c8d3f6a2-7b1e-4f9c-a5d0-3e6b8c1f2a22",
        name: "Dr. Mira Okafor",
        email: "mira.okafor@okaforpediatrics.com",
        category: "doctor",
        appointments: 10,
        completed: 8,
        response_hours: 3,
        ratings: &[5, 4, 4, 4, 4],
        complaints: 1,
    },
    ProviderProfile {
        id: "2e5f8a13-9c4d-4b7a-b6e1-5d8f0a3c7e03",
        owner: "a1b7c4d9-2e8f-4a6b-9c3d-6f0e2b5a8c33",
        name: "Northside Dental",
        email: "hello@northsidedental.com",
        category: "dentist",
        appointments: 12,
        completed: 6,
        response_hours: 18,
        ratings: &[3, 2, 4, 3],
        complaints: 3,
    },
];

pub fn demo_dataset(now: DateTime<Utc>) -> anyhow::Result<DemoDataset> {
    let mut dataset = DemoDataset {
        providers: Vec::new(),
        appointments: Vec::new(),
        reviews: Vec::new(),
        complaints: Vec::new(),
    };

    for profile in PROFILES.iter() {
        let provider_id = Uuid::parse_str(profile.id).context("invalid demo provider id")?;
        dataset.providers.push(Provider {
            id: provider_id,
            name: profile.name.to_string(),
            email: profile.email.to_string(),
            category: profile.category.to_string(),
            owner_user_id: Uuid::parse_str(profile.owner).context("invalid demo owner id")?,
        });

        // One request per day, newest first, each answered before `now`.
        for index in 0..profile.appointments {
            let requested_at = now - Duration::hours(profile.response_hours + 6 + index * 24);
            let status = if index < profile.completed {
                AppointmentStatus::Completed
            } else if index % 2 == 0 {
                AppointmentStatus::Cancelled
            } else {
                AppointmentStatus::NoShow
            };

            dataset.appointments.push(AppointmentRecord {
                id: Uuid::new_v4(),
                provider_id,
                status,
                requested_at,
                responded_at: Some(requested_at + Duration::hours(profile.response_hours)),
            });
        }

        for (index, rating) in profile.ratings.iter().enumerate() {
            dataset.reviews.push(ReviewRecord {
                id: Uuid::new_v4(),
                provider_id,
                rating: *rating,
                is_visible: true,
                created_at: now - Duration::days(index as i64 + 1),
            });
        }

        for index in 0..profile.complaints {
            dataset.complaints.push(ComplaintRecord {
                id: Uuid::new_v4(),
                provider_id,
                appointment_id: None,
                reason: "Appointment started significantly late".to_string(),
                filed_at: now - Duration::days(index + 2),
            });
        }
    }

    Ok(dataset)
}
