//! The clinic's screens and their allow-lists, in one place.
//! Order matters: the first matching pattern wins, so narrow routes come first.

use crate::error::AppResult;
use crate::guard::{RouteRule, RouteTable};
use crate::identity::Role::{self, *};

const STAFF: &[Role] = &[Doctor, Nurse, Receptionist, LabTechnician, Pharmacist];

pub fn clinic_routes() -> AppResult<RouteTable> {
    RouteTable::new(vec![
        // public
        RouteRule::public("/", "landing")?,
        RouteRule::public("/login", "login")?,
        RouteRule::public("/register", "register")?,
        RouteRule::public("/forgot-password", "forgot_password")?,
        RouteRule::public("/reset-password", "reset_password")?,
        RouteRule::public("/verify-email", "verify_email")?,
        // any signed-in user
        RouteRule::authenticated("/profile", "profile")?,
        RouteRule::authenticated("/change-password", "change_password")?,
        // role dashboards
        RouteRule::roles("/super-admin/*", "super_admin_dashboard", &[SuperAdmin])?,
        RouteRule::roles("/analytics/*", "analytics", &[SuperAdmin])?,
        RouteRule::roles("/clinician/staff/*", "staff_management", &[ClinicianAdmin, SuperAdmin])?,
        RouteRule::roles("/clinician/*", "clinician_dashboard", &[ClinicianAdmin, SuperAdmin])?,
        RouteRule::roles("/doctor/*", "doctor_dashboard", &[Doctor])?,
        RouteRule::roles("/nurse/*", "nurse_dashboard", &[Nurse])?,
        RouteRule::roles("/receptionist/*", "receptionist_dashboard", &[Receptionist])?,
        RouteRule::roles("/lab-technician/*", "lab_dashboard", &[LabTechnician])?,
        RouteRule::roles("/pharmacist/*", "pharmacist_dashboard", &[Pharmacist])?,
        RouteRule::roles("/patient/*", "patient_dashboard", &[Patient])?,
        // appointments
        RouteRule::roles("/appointments/book", "book_appointment", &[Patient, Receptionist])?,
        RouteRule::roles("/appointments/:id", "appointment_detail", &[Patient, Doctor, Nurse, Receptionist])?,
        RouteRule::roles("/appointments", "appointments", &[Patient, Doctor, Nurse, Receptionist, ClinicianAdmin])?,
        // pharmacy shop
        RouteRule::roles("/pharmacy/cart", "cart", &[Patient])?,
        RouteRule::roles("/pharmacy/checkout", "checkout", &[Patient])?,
        RouteRule::roles("/pharmacy/orders/*", "orders", &[Patient, Pharmacist])?,
        RouteRule::roles("/pharmacy/inventory/*", "inventory", &[Pharmacist, ClinicianAdmin])?,
        RouteRule::roles("/pharmacy/*", "pharmacy", &[Patient, Pharmacist])?,
        // clinical records
        RouteRule::roles("/prescriptions/:id", "prescription_detail", &[Patient, Doctor, Pharmacist])?,
        RouteRule::roles("/prescriptions", "prescriptions", &[Patient, Doctor, Pharmacist])?,
        RouteRule::roles("/lab-results/*", "lab_results", &[Patient, Doctor, LabTechnician])?,
        RouteRule::roles("/mental-health/*", "mental_health", &[Patient, Doctor])?,
        RouteRule::roles("/patients/*", "patient_records", STAFF)?,
    ])
}
